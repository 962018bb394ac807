//! Contract tests for synchronous_worker
//!
//! Each module pins one observable property of workers, first through the
//! Rust API and then through the JavaScript binding.

use boa_engine::{JsValue, Source};
use synchronous_worker::{HostRuntime, RunMode, SynchronousWorker, WorkerError, WorkerOptions};

fn host() -> HostRuntime {
    let mut host = HostRuntime::new().unwrap();
    host.install_worker_api().unwrap();
    host
}

fn eval_text(host: &mut HostRuntime, source: &str) -> String {
    let value = host.eval(source).unwrap();
    value
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_else(|| panic!("expected a string, got {value:?}"))
}

fn eval_bool(host: &mut HostRuntime, source: &str) -> bool {
    host.eval(source).unwrap().as_boolean().unwrap()
}

mod shared_defaults {
    use super::*;

    #[test]
    fn run_loop_is_usage_error() {
        let mut host = host();
        let worker = SynchronousWorker::new(&mut host, WorkerOptions::default()).unwrap();
        let err = worker.run_loop(RunMode::Default, host.context_mut()).unwrap_err();
        assert!(matches!(err, WorkerError::SharedEventLoop(_)));
        assert_eq!(
            err.to_string(),
            "Can only use .runLoop() when using a separate event loop"
        );
    }

    #[test]
    fn promise_wait_is_usage_error() {
        let mut host = host();
        let worker = SynchronousWorker::new(&mut host, WorkerOptions::default()).unwrap();
        let err = worker
            .run_loop_until_promise_resolved(&JsValue::undefined(), host.context_mut())
            .unwrap_err();
        assert!(matches!(err, WorkerError::NotExclusive));
    }

    #[test]
    fn javascript_sees_the_same_messages() {
        let mut host = host();
        let messages = eval_text(
            &mut host,
            "const w = new SynchronousWorker(); const out = []; \
             try { w.runLoop('default'); } catch (e) { out.push(e.message); } \
             try { w.runLoopUntilPromiseResolved(Promise.resolve()); } catch (e) { out.push(e.message); } \
             out.join('|')",
        );
        assert_eq!(
            messages,
            "Can only use .runLoop() when using a separate event loop|\
             Can only use .runLoopUntilPromiseResolved() when using a separate event loop and microtask queue"
        );
    }
}

mod own_queue_flush {
    use super::*;

    #[test]
    fn microtask_runs_before_scope_returns() {
        let mut host = host();
        let worker = SynchronousWorker::new(&mut host, WorkerOptions::isolated()).unwrap();
        let context = host.context_mut();
        worker
            .run_in_callback_scope(context, |context| {
                context.eval(Source::from_bytes("globalThis.ran = false; queueMicrotask(() => { ran = true; })"))
            })
            .unwrap();
        let global = worker.global_this().unwrap();
        let ran = global.get(boa_engine::js_string!("ran"), context).unwrap();
        assert_eq!(ran.as_boolean(), Some(true));
    }

    #[test]
    fn javascript_callback_scope() {
        let mut host = host();
        assert!(eval_bool(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let ran = false; \
             w.runInCallbackScope(() => { w.globalThis.queueMicrotask(() => ran = true); }); \
             ran",
        ));
    }
}

mod own_loop_shared_queue {
    use super::*;

    #[test]
    fn deferred_microtask_waits_for_host_flush() {
        let mut host = host();
        let worker = SynchronousWorker::new(&mut host, WorkerOptions::default().with_own_loop(true)).unwrap();
        let context = host.context_mut();
        worker
            .eval(
                "globalThis.ran = false; setImmediate(() => queueMicrotask(() => { ran = true; }));",
                context,
            )
            .unwrap();
        worker.run_loop(RunMode::Default, context).unwrap();
        let global = worker.global_this().unwrap();
        let ran = global.get(boa_engine::js_string!("ran"), context).unwrap();
        assert_eq!(ran.as_boolean(), Some(false));

        host.run_microtasks();
        let ran = global.get(boa_engine::js_string!("ran"), host.context_mut()).unwrap();
        assert_eq!(ran.as_boolean(), Some(true));
    }

    #[test]
    fn javascript_host_turn_boundary() {
        let mut host = host();
        let during = eval_bool(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true }); \
             globalThis.ran = false; \
             w.runInCallbackScope(() => { \
               w.globalThis.setImmediate(() => { w.globalThis.queueMicrotask(() => ran = true); }); \
             }); \
             w.runLoop('default'); \
             ran",
        );
        assert!(!during);
        assert!(eval_bool(&mut host, "ran"));
    }

    #[test]
    fn javascript_shared_loop_own_queue() {
        let mut host = host();
        assert!(!eval_bool(
            &mut host,
            "const w = new SynchronousWorker({ ownMicrotaskQueue: true }); \
             globalThis.ran = false; \
             w.runInCallbackScope(() => { \
               w.globalThis.setImmediate(() => { w.globalThis.queueMicrotask(() => ran = true); }); \
             }); \
             ran",
        ));
        host.run_event_loop().unwrap();
        assert!(eval_bool(&mut host, "ran"));
    }
}

mod idempotent_stop {
    use super::*;

    #[test]
    fn both_stops_resolve_and_worker_stays_stopped() {
        let mut host = host();
        host.eval(
            "globalThis.w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             globalThis.resolved = 0; \
             w.stop().then(() => resolved++); \
             w.stop().then(() => resolved++);",
        )
        .unwrap();
        host.run_event_loop().unwrap();

        let summary = eval_text(
            &mut host,
            "let m; try { w.runLoop('default'); } catch (e) { m = e.message; } \
             [resolved, w.loopAlive, m].join('|')",
        );
        assert_eq!(summary, "2|false|Worker has been stopped");
    }

    #[test]
    fn rust_release_runs_once() {
        let mut host = host();
        let worker = SynchronousWorker::new(&mut host, WorkerOptions::isolated()).unwrap();
        worker.stop(host.context_mut());
        worker.stop(host.context_mut());
        host.run_event_loop().unwrap();
        assert!(worker.is_released());
        assert_eq!(host.shared().router().route_count(), 0);
        assert!(!worker.loop_alive().unwrap());
    }
}

mod exit_in_scope {
    use super::*;

    #[test]
    fn interrupts_callback_scope() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let ranBefore = false, ranAfter = false, codes = []; \
             w.on('exit', (code) => codes.push(code)); \
             w.runInCallbackScope(() => { ranBefore = true; w.process.exit(1); ranAfter = true; }); \
             [ranBefore, ranAfter, codes.join()].join('|')",
        );
        assert_eq!(summary, "true|false|1");
    }

    #[test]
    fn interrupts_run_loop() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let ranBefore = false, ranAfter = false, codes = []; \
             w.on('exit', (code) => codes.push(code)); \
             w.runInCallbackScope(() => { \
               w.globalThis.setImmediate(() => { ranBefore = true; w.process.exit(1); ranAfter = true; }); \
             }); \
             w.runLoop('default'); \
             [ranBefore, ranAfter, codes.join()].join('|')",
        );
        assert_eq!(summary, "true|false|1");
    }
}

mod exit_in_async_code {
    use super::*;

    #[test]
    fn exit_from_then_handler() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             const codes = []; \
             w.on('exit', (code) => codes.push(code)); \
             w.runInCallbackScope(() => w.globalThis.eval( \
               \"globalThis.log = []; Promise.resolve().then(() => { process.exit(2); log.push('after'); });\" \
             )); \
             [codes.join(), w.globalThis.log.length, w.loopAlive].join('|')",
        );
        assert_eq!(summary, "2|0|false");
    }

    #[test]
    fn exit_from_promise_executor() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             const codes = []; \
             w.on('exit', (code) => codes.push(code)); \
             w.runInCallbackScope(() => { \
               new w.globalThis.Promise(() => { w.process.exit(4); codes.push('after'); }); \
             }); \
             codes.join()",
        );
        assert_eq!(summary, "4");
    }

    #[test]
    fn exit_after_await_in_loop() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             const codes = []; \
             w.on('exit', (code) => codes.push(code)); \
             w.runInCallbackScope(() => w.globalThis.eval( \
               \"globalThis.log = []; setImmediate(async () => { await null; process.exit(6); log.push('after'); });\" \
             )); \
             w.runLoop('default'); \
             [codes.join(), w.globalThis.log.length].join('|')",
        );
        assert_eq!(summary, "6|0");
    }
}

mod exit_outside_scope {
    use super::*;

    #[test]
    fn emits_once_and_stops() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             const codes = []; \
             w.on('exit', (code) => codes.push(code)); \
             w.process.exit(1); \
             let m; try { w.runLoop('default'); } catch (e) { m = e.message; } \
             [codes.join(), m].join('|')",
        );
        assert_eq!(summary, "1|Worker has been stopped");
    }
}

mod nested_run_loop {
    use super::*;

    #[test]
    fn surfaces_as_uncaught_exception() {
        let mut host = host();
        let message = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let uncaught; \
             w.process.on('uncaughtException', (err) => uncaught = err); \
             w.globalThis.setImmediate(() => w.runLoop('default')); \
             w.runLoop('default'); \
             uncaught.message",
        );
        assert_eq!(message, "Cannot nest calls to runLoop");
    }

    #[test]
    fn uncaught_without_listener_errors_and_exits() {
        let mut host = host();
        let summary = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let code, error; \
             w.on('exit', (c) => code = c); \
             w.on('error', (e) => error = e); \
             w.globalThis.setImmediate(() => { throw new Error('foobar'); }); \
             w.runLoop('default'); \
             [code, error.message].join('|')",
        );
        assert_eq!(summary, "1|foobar");
    }
}

mod promise_waiter {
    use super::*;

    #[test]
    fn returns_fulfilled_value() {
        let mut host = host();
        let value = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let p; \
             w.runInCallbackScope(() => { \
               p = new w.globalThis.Promise((resolve) => w.globalThis.setTimeout(() => resolve('V'), 5)); \
             }); \
             w.runLoopUntilPromiseResolved(p)",
        );
        assert_eq!(value, "V");
    }

    #[test]
    fn raises_rejection() {
        let mut host = host();
        let message = eval_text(
            &mut host,
            "const w = new SynchronousWorker({ ownLoop: true, ownMicrotaskQueue: true }); \
             let p; \
             w.runInCallbackScope(() => { \
               p = new w.globalThis.Promise((_, reject) => w.globalThis.setImmediate(() => reject(new Error('E')))); \
             }); \
             let m; try { w.runLoopUntilPromiseResolved(p); } catch (e) { m = e.message; } m",
        );
        assert_eq!(message, "E");
    }
}
