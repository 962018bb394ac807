//! Callback scopes.
//!
//! A callback scope runs host-supplied code with the worker realm current,
//! marks the worker as terminable for the duration, and flushes the worker's
//! own microtask queue on the way out. Termination inside the callback ends
//! the scope quietly; other exceptions go to the caller (direct scopes) or
//! to the uncaught exception relay (loop callbacks).

use crate::error::{WorkerError, WorkerResult};
use crate::worker::{SynchronousWorker, WorkerInner};
use async_runtime::{Callback, CallbackScope};
use boa_engine::realm::Realm;
use boa_engine::{Context, JsObject, JsResult, JsValue, Source};
use std::cell::Cell;

/// Runs `f` with `realm` as the current realm, restoring the previous one.
pub(crate) fn in_realm<R>(
    context: &mut Context,
    realm: &Realm,
    f: impl FnOnce(&mut Context) -> R,
) -> R {
    let previous = context.enter_realm(realm.clone());
    let result = f(context);
    context.enter_realm(previous);
    result
}

/// Sets a flag for its lifetime and restores the previous value on drop.
pub(crate) struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> FlagGuard<'a> {
    pub(crate) fn set(flag: &'a Cell<bool>, value: bool) -> Self {
        let previous = flag.replace(value);
        Self { flag, previous }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Runs `f` inside the worker: its realm is current and `process.exit`
/// unwinds instead of returning.
pub(crate) fn in_worker_scope<R>(
    worker: &WorkerInner,
    context: &mut Context,
    f: impl FnOnce(&mut Context) -> R,
) -> R {
    let _terminable = FlagGuard::set(&worker.can_be_terminated, true);
    in_realm(context, &worker.realm, f)
}

impl CallbackScope for WorkerInner {
    fn scope_id(&self) -> u64 {
        self.id
    }

    fn is_terminating(&self) -> bool {
        WorkerInner::is_terminating(self)
    }

    fn invoke(&self, callback: Callback, context: &mut Context) {
        in_worker_scope(self, context, |context| {
            if let Err(err) = callback(context) {
                self.handle_error(err, context);
            }
            if !self.is_terminating() {
                self.flush_microtasks(context);
            }
        });
    }
}

impl SynchronousWorker {
    /// Runs `f` inside the worker and flushes the worker's own microtask
    /// queue before returning.
    ///
    /// If `f` reaches the termination path, the worker stops, the exit error
    /// unwinds the rest of `f` unless worker code catches it, and
    /// `Ok(undefined)` is returned.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Stopped`] on a stopped worker,
    /// [`WorkerError::NestedCallbackScope`] from inside another callback
    /// scope of this worker, or the exception thrown by `f`.
    pub fn run_in_callback_scope<F>(&self, context: &mut Context, f: F) -> WorkerResult<JsValue>
    where
        F: FnOnce(&mut Context) -> JsResult<JsValue>,
    {
        let inner = &self.inner;
        if inner.is_terminating() {
            return Err(WorkerError::Stopped);
        }
        if inner.in_callback_scope.get() {
            return Err(WorkerError::NestedCallbackScope);
        }
        let _active = FlagGuard::set(&inner.in_callback_scope, true);

        let result = in_worker_scope(inner, context, |context| {
            let result = f(context);
            if !inner.is_terminating() {
                inner.flush_microtasks(context);
            }
            result
        });

        match result {
            Ok(value) => Ok(value),
            Err(_) if inner.exited.get() => Ok(JsValue::undefined()),
            Err(err) => Err(WorkerError::Js(err)),
        }
    }

    /// Calls `function` with a `null` receiver inside a callback scope.
    pub fn call_in_callback_scope(&self, function: &JsObject, context: &mut Context) -> WorkerResult<JsValue> {
        self.run_in_callback_scope(context, |context| {
            function.call(&JsValue::null(), &[], context)
        })
    }

    /// Evaluates `source` in the worker realm inside a callback scope.
    pub fn eval(&self, source: &str, context: &mut Context) -> WorkerResult<JsValue> {
        self.run_in_callback_scope(context, |context| {
            context.eval(Source::from_bytes(source))
        })
    }
}
