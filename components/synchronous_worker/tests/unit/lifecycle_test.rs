//! Worker construction, stop and release

use super::{call, host, isolated};
use boa_engine::builtins::promise::PromiseState;
use boa_engine::{JsObject, JsValue};
use std::cell::RefCell;
use std::rc::Rc;
use synchronous_worker::{
    RunMode, SynchronousWorker, WorkerError, WorkerEvent, WorkerOptions, WorkerState,
};

#[test]
fn test_new_worker_is_running() {
    let mut host = host();
    let worker = isolated(&mut host);
    assert_eq!(worker.state(), WorkerState::Running);
    assert!(!worker.is_released());
    assert!(worker.options().is_isolated());
}

#[test]
fn test_worker_ids_are_unique() {
    let mut host = host();
    let a = isolated(&mut host);
    let b = isolated(&mut host);
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_stop_signals_now_and_releases_on_host_turn() {
    let mut host = host();
    let worker = isolated(&mut host);

    let promise = worker.stop(host.context_mut());
    assert_eq!(worker.state(), WorkerState::Stopped);
    assert!(!worker.is_released());
    assert!(matches!(promise.state(), PromiseState::Pending));

    host.run_event_loop().unwrap();
    assert!(worker.is_released());
    assert!(matches!(promise.state(), PromiseState::Fulfilled(_)));
}

#[test]
fn test_stop_twice_returns_same_promise() {
    let mut host = host();
    let worker = isolated(&mut host);
    let first = worker.stop(host.context_mut());
    let second = worker.stop(host.context_mut());
    assert!(JsObject::equals(&first, &second));

    host.run_event_loop().unwrap();
    assert!(matches!(second.state(), PromiseState::Fulfilled(_)));
    let third = worker.stop(host.context_mut());
    assert!(JsObject::equals(&first, &third));
}

#[test]
fn test_operations_after_stop_fail() {
    let mut host = host();
    let worker = isolated(&mut host);
    worker.stop(host.context_mut());
    host.run_event_loop().unwrap();

    let context = host.context_mut();
    assert!(matches!(
        worker.run_loop(RunMode::Default, context),
        Err(WorkerError::Stopped)
    ));
    assert!(!worker.loop_alive().unwrap());
    assert!(matches!(
        worker.eval("1", context),
        Err(WorkerError::Stopped)
    ));
    assert!(matches!(worker.async_handle(), Err(WorkerError::Stopped)));
    assert!(matches!(worker.process(), Err(WorkerError::NotInitialized)));
}

#[test]
fn test_own_queue_route_removed_on_drop() {
    let mut host = host();
    let worker = isolated(&mut host);
    assert_eq!(host.shared().router().route_count(), 1);
    drop(worker);
    assert_eq!(host.shared().router().route_count(), 0);
}

#[test]
fn test_shared_loop_work_purged_on_stop() {
    let mut host = host();
    let worker = SynchronousWorker::new(&mut host, WorkerOptions::default()).unwrap();
    let context = host.context_mut();
    worker
        .eval("setTimeout(() => { globalThis.fired = true; }, 50)", context)
        .unwrap();
    assert!(host.shared().event_loop().is_alive());

    worker.stop(host.context_mut());
    host.run_event_loop().unwrap();
    assert!(!host.shared().event_loop().is_alive());
}

#[test]
fn test_exit_outside_scope_emits_once_and_stops() {
    let mut host = host();
    let worker = isolated(&mut host);
    let codes = Rc::new(RefCell::new(Vec::new()));
    let seen = codes.clone();
    worker.on_exit(move |code, _| seen.borrow_mut().push(code));

    let context = host.context_mut();
    let process = worker.process().unwrap();
    call(&process, "exit", &[JsValue::from(3)], context);
    call(&process, "exit", &[JsValue::from(4)], context);

    assert_eq!(*codes.borrow(), vec![3]);
    assert_eq!(worker.state(), WorkerState::Stopped);
    assert!(matches!(
        worker.run_loop(RunMode::Default, context),
        Err(WorkerError::Stopped)
    ));
}

#[test]
fn test_generic_listener_sees_error_then_exit() {
    let mut host = host();
    let worker = isolated(&mut host);
    let names = Rc::new(RefCell::new(Vec::new()));
    let seen = names.clone();
    worker.on(move |event: &WorkerEvent, _| seen.borrow_mut().push(event.name()));

    let context = host.context_mut();
    worker
        .eval("setImmediate(() => { throw new Error('boom'); })", context)
        .unwrap();
    worker.run_loop(RunMode::Default, context).unwrap();

    assert_eq!(*names.borrow(), vec!["error", "exit"]);
}

#[test]
fn test_initializer_sees_process_and_require() {
    let mut host = host();
    let worker = SynchronousWorker::builder()
        .options(WorkerOptions::isolated())
        .initializer(|load, context| {
            let vm = load
                .require
                .call(&JsValue::undefined(), &[boa_engine::js_string!("vm").into()], context)?;
            load.global
                .set(boa_engine::js_string!("vm"), vm, true, context)?;
            load.process
                .set(boa_engine::js_string!("title"), boa_engine::js_string!("worker"), true, context)?;
            Ok(())
        })
        .build(&mut host)
        .unwrap();

    let context = host.context_mut();
    let result = worker
        .eval("typeof vm.runInThisContext + ' ' + process.title", context)
        .unwrap();
    assert_eq!(super::text(&result), "function worker");
}

#[test]
fn test_failing_initializer_is_startup_error() {
    let mut host = host();
    let result = SynchronousWorker::builder()
        .own_loop(true)
        .own_microtask_queue(true)
        .initializer(|_, _| {
            Err(boa_engine::JsNativeError::error()
                .with_message("cannot load")
                .into())
        })
        .build(&mut host);

    match result {
        Err(WorkerError::Startup(err)) => assert!(err.to_string().contains("cannot load")),
        other => panic!("expected startup error, got {other:?}"),
    }
    assert_eq!(host.shared().router().route_count(), 0);
}

#[test]
fn test_async_handle_posts_from_thread() {
    let mut host = host();
    let worker = isolated(&mut host);
    let handle = worker.async_handle().unwrap();

    let sender = std::thread::spawn(move || {
        handle
            .send(|context| {
                context.eval(boa_engine::Source::from_bytes("globalThis.posted = 'yes'"))?;
                Ok(())
            })
            .unwrap();
    });
    sender.join().unwrap();

    let context = host.context_mut();
    worker.run_loop(RunMode::Default, context).unwrap();
    assert_eq!(super::global_text(&worker, "posted", context), "yes");
    assert!(!worker.loop_alive().unwrap());
}
