//! The embedded process object

use super::{host, isolated, text};
use boa_engine::js_string;
use synchronous_worker::RunMode;

#[test]
fn test_process_shape() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    let shape = worker
        .eval(
            "[typeof process.exit, typeof process.reallyExit, typeof process.nextTick, \
              typeof process.cwd(), typeof process.pid, Array.isArray(process.argv), \
              typeof process.env, global === globalThis].join()",
            context,
        )
        .unwrap();
    assert_eq!(text(&shape), "function,function,function,string,number,true,object,true");
}

#[test]
fn test_platform_is_node_style() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    let platform = worker.eval("process.platform", context).unwrap();
    assert_eq!(text(&platform), synchronous_worker::platform());
}

#[test]
fn test_next_tick_runs_before_scope_returns() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    worker
        .eval("globalThis.ticked = ''; process.nextTick((a, b) => { ticked = a + b; }, 'x', 'y');", context)
        .unwrap();
    let ticked = worker.eval("ticked", context).unwrap();
    assert_eq!(text(&ticked), "xy");
}

#[test]
fn test_process_exit_event_sees_code() {
    let mut host = host();
    let worker = isolated(&mut host);
    let context = host.context_mut();
    worker
        .eval(
            "globalThis.seen = []; process.on('exit', (code) => seen.push(code)); \
             setImmediate(() => { process.exitCode = 7; process.exit(); });",
            context,
        )
        .unwrap();
    let global = worker.global_this().unwrap();
    worker.run_loop(RunMode::Default, context).unwrap();
    let seen = global.get(js_string!("seen"), context).unwrap();
    let first = seen.as_object().unwrap().get(0_u32, context).unwrap();
    assert_eq!(first.as_number(), Some(7.0));
}

#[test]
fn test_embedder_uncaught_listener_defers_relay() {
    let mut host = host();
    let worker = isolated(&mut host);
    let errored = std::rc::Rc::new(std::cell::Cell::new(false));
    let flag = errored.clone();
    worker.on_error(move |_, _| flag.set(true));

    let context = host.context_mut();
    worker
        .eval(
            "globalThis.caught = ''; \
             process.on('uncaughtException', (err) => { caught = err.message; }); \
             setImmediate(() => { throw new Error('foobar'); });",
            context,
        )
        .unwrap();
    worker.run_loop(RunMode::Default, context).unwrap();

    let caught = worker.eval("caught", context).unwrap();
    assert_eq!(text(&caught), "foobar");
    assert!(!errored.get());
    assert!(worker.loop_alive().is_ok());
}
