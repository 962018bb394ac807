//! The `SynchronousWorker` constructor exposed to host JavaScript.
//!
//! A small class wraps a native handle object held in a private field; every
//! method forwards to the handle, whose functions call straight into
//! [`SynchronousWorker`].

use crate::host::HostShared;
use crate::native::{define_function, eval_script, function, plain_object};
use crate::worker::SynchronousWorker;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsValue};
use boa_gc::{Finalize, Trace};
use core_types::{RunMode, WorkerOptions};
use std::rc::{Rc, Weak};

const CLASS_SOURCE: &str = r#"(function (createHandle) {
  'use strict';
  class SynchronousWorker {
    #handle;

    constructor(options) {
      this.#handle = createHandle(options === undefined || options === null ? {} : options);
    }

    runLoop(mode = 'default') {
      this.#handle.runLoop(mode);
    }

    get loopAlive() {
      return this.#handle.loopAlive();
    }

    runInCallbackScope(method) {
      return this.#handle.runInCallbackScope(method);
    }

    runInWorkerScope(method) {
      return this.runInCallbackScope(method);
    }

    runLoopUntilPromiseResolved(promise) {
      return this.#handle.runLoopUntilPromiseResolved(promise);
    }

    stop() {
      return this.#handle.stop();
    }

    createRequire(filename) {
      return this.#handle.createRequire(filename);
    }

    get process() {
      return this.#handle.process();
    }

    get globalThis() {
      return this.#handle.globalThis();
    }

    on(event, listener) {
      this.#handle.on(event, listener);
      return this;
    }
  }
  return SynchronousWorker;
})"#;

#[derive(Clone, Trace, Finalize)]
struct HostCaptures {
    #[unsafe_ignore_trace]
    host: Weak<HostShared>,
}

#[derive(Clone, Trace, Finalize)]
struct HandleCaptures {
    #[unsafe_ignore_trace]
    worker: SynchronousWorker,
}

type HandleFn = fn(&JsValue, &[JsValue], &HandleCaptures, &mut Context) -> JsResult<JsValue>;

/// Registers the `SynchronousWorker` class on the current realm's global.
pub(crate) fn install(host: &Rc<HostShared>, context: &mut Context) -> JsResult<()> {
    let create_handle = function(
        "createHandle",
        1,
        create_handle,
        HostCaptures {
            host: Rc::downgrade(host),
        },
        context,
    );
    let factory = eval_script(CLASS_SOURCE, context)?;
    let factory = factory.as_callable().cloned().ok_or_else(|| {
        JsError::from(JsNativeError::typ().with_message("worker class bootstrap is not callable"))
    })?;
    let class = factory.call(&JsValue::undefined(), &[create_handle.into()], context)?;
    context.register_global_property(
        js_string!("SynchronousWorker"),
        class,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )?;
    tracing::debug!("SynchronousWorker class installed");
    Ok(())
}

fn options_arg(value: &JsValue, context: &mut Context) -> JsResult<WorkerOptions> {
    if value.is_undefined() || value.is_null() {
        return Ok(WorkerOptions::default());
    }
    let json = value.to_json(context)?;
    serde_json::from_value(json).map_err(|err| {
        JsNativeError::typ()
            .with_message(format!("Invalid worker options: {err}"))
            .into()
    })
}

fn create_handle(
    _: &JsValue,
    args: &[JsValue],
    captures: &HostCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let host = captures.host.upgrade().ok_or_else(|| {
        JsError::from(JsNativeError::error().with_message("Host runtime has been dropped"))
    })?;
    let options = options_arg(args.get_or_undefined(0), context)?;
    let worker = SynchronousWorker::create(&host, options, Vec::new(), None, context)?;

    let handle = plain_object(context);
    let captures = HandleCaptures { worker };
    let methods: [(&str, usize, HandleFn); 9] = [
        ("runLoop", 1, run_loop),
        ("loopAlive", 0, loop_alive),
        ("runInCallbackScope", 1, run_in_callback_scope),
        ("runLoopUntilPromiseResolved", 1, run_loop_until_promise_resolved),
        ("stop", 0, stop),
        ("createRequire", 1, create_require),
        ("process", 0, process),
        ("globalThis", 0, global_this),
        ("on", 2, on),
    ];
    for (name, length, body) in methods {
        define_function(&handle, name, length, body, captures.clone(), context)?;
    }
    Ok(handle.into())
}

fn run_loop(
    _: &JsValue,
    args: &[JsValue],
    captures: &HandleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let mode = match args.get_or_undefined(0) {
        value if value.is_undefined() => RunMode::Default,
        value => value
            .to_string(context)?
            .to_std_string_escaped()
            .parse::<RunMode>()
            .map_err(|err| JsNativeError::typ().with_message(err.to_string()))?,
    };
    captures.worker.run_loop(mode, context)?;
    Ok(JsValue::undefined())
}

fn loop_alive(
    _: &JsValue,
    _: &[JsValue],
    captures: &HandleCaptures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    Ok(captures.worker.loop_alive()?.into())
}

fn run_in_callback_scope(
    _: &JsValue,
    args: &[JsValue],
    captures: &HandleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let method = args.get_or_undefined(0).as_callable().cloned().ok_or_else(|| {
        JsError::from(
            JsNativeError::typ().with_message("The runInCallbackScope() argument must be a function"),
        )
    })?;
    Ok(captures.worker.call_in_callback_scope(&method, context)?)
}

fn run_loop_until_promise_resolved(
    _: &JsValue,
    args: &[JsValue],
    captures: &HandleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    Ok(captures
        .worker
        .run_loop_until_promise_resolved(args.get_or_undefined(0), context)?)
}

fn stop(
    _: &JsValue,
    _: &[JsValue],
    captures: &HandleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    Ok(captures.worker.stop(context).into())
}

fn create_require(
    _: &JsValue,
    args: &[JsValue],
    captures: &HandleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let filename = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    Ok(captures.worker.create_require(&filename, context)?.into())
}

fn process(
    _: &JsValue,
    _: &[JsValue],
    captures: &HandleCaptures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    Ok(captures.worker.process()?.into())
}

fn global_this(
    _: &JsValue,
    _: &[JsValue],
    captures: &HandleCaptures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    Ok(captures.worker.global_this()?.into())
}

fn call_listener(listener: &JsObject, args: &[JsValue], event: &str, context: &mut Context) {
    if let Err(err) = listener.call(&JsValue::undefined(), args, context) {
        tracing::warn!(event, error = %err, "worker event listener threw");
    }
}

fn on(
    this: &JsValue,
    args: &[JsValue],
    captures: &HandleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let event = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let listener = args.get_or_undefined(1).as_callable().cloned().ok_or_else(|| {
        JsError::from(
            JsNativeError::typ().with_message("The \"listener\" argument must be of type function"),
        )
    })?;
    match event.as_str() {
        "exit" => captures.worker.on_exit(move |code, context| {
            call_listener(&listener, &[JsValue::from(code)], "exit", context);
        }),
        "error" => captures.worker.on_error(move |error, context| {
            call_listener(&listener, &[error.clone()], "error", context);
        }),
        other => tracing::debug!(event = other, "ignoring listener for unknown worker event"),
    }
    Ok(this.clone())
}
