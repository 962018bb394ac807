//! Callback scopes and microtask flushing

use super::{global_text, host, isolated, text};
use boa_engine::{js_string, JsValue, Source};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use synchronous_worker::{RunMode, SynchronousWorker, WorkerError, WorkerOptions, WorkerState};

#[test]
fn test_callback_scope_returns_value() {
    let mut host = host();
    let worker = isolated(&mut host);
    let value = worker
        .run_in_callback_scope(host.context_mut(), |context| {
            context.eval(Source::from_bytes("6 * 7"))
        })
        .unwrap();
    assert_eq!(value.as_number(), Some(42.0));
}

#[test]
fn test_callback_scope_runs_in_worker_realm() {
    let mut host = host();
    let worker = isolated(&mut host);
    host.eval("globalThis.side = 'host'").unwrap();
    let context = host.context_mut();
    worker.eval("globalThis.side = 'worker'", context).unwrap();
    assert_eq!(global_text(&worker, "side", context), "worker");
    let host_side = host.eval("side").unwrap();
    assert_eq!(text(&host_side), "host");
}

#[test]
fn test_own_queue_flushed_before_return() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    worker
        .eval(
            "globalThis.order = []; \
             Promise.resolve().then(() => order.push('promise')); \
             queueMicrotask(() => order.push('microtask')); \
             order.push('sync');",
            context,
        )
        .unwrap();
    let order = worker.eval("order.join()", context).unwrap();
    assert_eq!(text(&order), "sync,promise,microtask");
}

#[test]
fn test_shared_queue_waits_for_host_turn() {
    let mut host = host();
    let worker = SynchronousWorker::new(&mut host, WorkerOptions::default()).unwrap();
    let context = host.context_mut();
    worker
        .eval("globalThis.ran = false; queueMicrotask(() => { ran = true; });", context)
        .unwrap();
    let global = worker.global_this().unwrap();
    assert_eq!(
        global.get(js_string!("ran"), context).unwrap().as_boolean(),
        Some(false)
    );

    host.run_microtasks();
    let context = host.context_mut();
    assert_eq!(
        global.get(js_string!("ran"), context).unwrap().as_boolean(),
        Some(true)
    );
}

#[test]
fn test_exception_goes_to_caller() {
    let mut host = host();
    let worker = isolated(&mut host);
    let err = worker
        .eval("throw new TypeError('bad input')", host.context_mut())
        .unwrap_err();
    assert!(matches!(err, WorkerError::Js(_)));
    assert!(err.to_string().contains("bad input"));
}

#[test]
fn test_exit_skips_rest_of_callback() {
    let mut host = host();
    let worker = isolated(&mut host);
    let observed = Rc::new(Cell::new(-1));
    let seen = observed.clone();
    worker.on_exit(move |code, _| seen.set(code));

    let context = host.context_mut();
    let result = worker
        .eval(
            "globalThis.before = true; \
             process.exit(5); \
             globalThis.after = true;",
            context,
        )
        .unwrap();
    assert!(result.is_undefined());
    assert_eq!(observed.get(), 5);
    assert_eq!(worker.state(), WorkerState::Stopped);

    let global = worker.global_this().unwrap();
    assert_eq!(global.get(js_string!("before"), context).unwrap().as_boolean(), Some(true));
    assert!(global.get(js_string!("after"), context).unwrap().is_undefined());
}

#[test]
fn test_exit_code_is_fixed_by_first_exit() {
    let mut host = host();
    let worker = isolated(&mut host);
    let codes = Rc::new(RefCell::new(Vec::new()));
    let sink = codes.clone();
    worker.on_exit(move |code, _| sink.borrow_mut().push(code));

    let context = host.context_mut();
    worker
        .eval(
            "try { process.exit(5); } catch (e) { globalThis.caught = true; process.exit(9); }",
            context,
        )
        .unwrap();
    assert_eq!(*codes.borrow(), vec![5]);
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[test]
fn test_exit_in_then_handler() {
    let mut host = host();
    let worker = isolated(&mut host);
    let observed = Rc::new(Cell::new(-1));
    let seen = observed.clone();
    worker.on_exit(move |code, _| seen.set(code));

    let context = host.context_mut();
    worker
        .eval(
            "globalThis.log = []; \
             Promise.resolve().then(() => { process.exit(5); log.push('after'); }); \
             Promise.resolve().then(() => log.push('second job')); \
             log.push('sync');",
            context,
        )
        .unwrap();
    assert_eq!(observed.get(), 5);
    assert_eq!(worker.state(), WorkerState::Stopped);

    let global = worker.global_this().unwrap();
    let log = global.get(js_string!("log"), context).unwrap();
    let log = log.as_object().unwrap();
    assert_eq!(log.get(js_string!("length"), context).unwrap().as_number(), Some(1.0));
    assert_eq!(text(&log.get(0_u32, context).unwrap()), "sync");
}

#[test]
fn test_exit_in_promise_executor() {
    let mut host = host();
    let worker = isolated(&mut host);
    let observed = Rc::new(Cell::new(-1));
    let seen = observed.clone();
    worker.on_exit(move |code, _| seen.set(code));
    let errored = Rc::new(Cell::new(false));
    let flag = errored.clone();
    worker.on_error(move |_, _| flag.set(true));

    let context = host.context_mut();
    worker
        .eval(
            "globalThis.reached = false; \
             new Promise(() => { process.exit(6); globalThis.reached = true; });",
            context,
        )
        .unwrap();
    assert_eq!(observed.get(), 6);
    assert!(!errored.get());
    let global = worker.global_this().unwrap();
    assert_eq!(global.get(js_string!("reached"), context).unwrap().as_boolean(), Some(false));
}

#[test]
fn test_exit_after_await() {
    let mut host = host();
    let worker = isolated(&mut host);
    let observed = Rc::new(Cell::new(-1));
    let seen = observed.clone();
    worker.on_exit(move |code, _| seen.set(code));

    let context = host.context_mut();
    worker
        .eval(
            "globalThis.log = []; \
             (async () => { log.push('start'); await null; process.exit(7); log.push('after'); })();",
            context,
        )
        .unwrap();
    assert_eq!(observed.get(), 7);
    let log = worker.global_this().unwrap().get(js_string!("log"), context).unwrap();
    let log = log.as_object().unwrap();
    assert_eq!(log.get(js_string!("length"), context).unwrap().as_number(), Some(1.0));
    assert_eq!(text(&log.get(0_u32, context).unwrap()), "start");
}

#[test]
fn test_exit_after_await_in_loop_step() {
    let mut host = host();
    let worker = isolated(&mut host);
    let observed = Rc::new(Cell::new(-1));
    let seen = observed.clone();
    worker.on_exit(move |code, _| seen.set(code));

    let context = host.context_mut();
    worker
        .eval(
            "globalThis.after = false; \
             setTimeout(async () => { await Promise.resolve(); process.exit(3); globalThis.after = true; }, 1);",
            context,
        )
        .unwrap();
    worker.run_loop(RunMode::Default, context).unwrap();
    assert_eq!(observed.get(), 3);
    assert!(!worker.loop_alive().unwrap());
    let global = worker.global_this().unwrap();
    assert_eq!(global.get(js_string!("after"), context).unwrap().as_boolean(), Some(false));
}

#[test]
fn test_nested_callback_scope_rejected() {
    let mut host = host();
    let worker = isolated(&mut host);
    let inner = worker.clone();
    let nested = Rc::new(Cell::new(false));
    let flag = nested.clone();

    worker
        .run_in_callback_scope(host.context_mut(), move |context| {
            let result = inner.run_in_callback_scope(context, |_| Ok(JsValue::undefined()));
            flag.set(matches!(result, Err(WorkerError::NestedCallbackScope)));
            Ok(JsValue::undefined())
        })
        .unwrap();
    assert!(nested.get());
}

#[test]
fn test_loop_callbacks_flush_own_queue() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    worker
        .eval(
            "globalThis.log = []; \
             setImmediate(() => { queueMicrotask(() => log.push('micro 1')); log.push('imm 1'); }); \
             setImmediate(() => log.push('imm 2'));",
            context,
        )
        .unwrap();
    worker.run_loop(RunMode::Default, context).unwrap();
    let log = worker.eval("log.join()", context).unwrap();
    assert_eq!(text(&log), "imm 1,micro 1,imm 2");
}

#[test]
fn test_call_in_callback_scope_uses_null_receiver() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    let function = worker
        .eval("(function () { 'use strict'; return this === null; })", context)
        .unwrap();
    let result = worker
        .call_in_callback_scope(function.as_object().unwrap(), context)
        .unwrap();
    assert_eq!(result.as_boolean(), Some(true));
}
