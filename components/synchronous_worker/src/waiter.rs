//! Synchronous promise resolution.

use crate::error::{WorkerError, WorkerResult};
use crate::native::eval_script;
use crate::scope::in_realm;
use crate::worker::SynchronousWorker;
use boa_engine::{js_string, Context, JsError, JsNativeError, JsObject, JsResult, JsValue};
use core_types::RunMode;

const INSPECTOR_SOURCE: &str = r#"(function (promise) {
  const record = { state: 'pending', value: null };
  Promise.resolve(promise).then(
    (value) => { record.state = 'fulfilled'; record.value = value; },
    (reason) => { record.state = 'rejected'; record.value = reason; },
  );
  return record;
})"#;

enum Settled {
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

fn read_record(record: &JsObject, context: &mut Context) -> JsResult<Settled> {
    let state = record.get(js_string!("state"), context)?;
    let state = state
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_default();
    let value = record.get(js_string!("value"), context)?;
    Ok(match state.as_str() {
        "fulfilled" => Settled::Fulfilled(value),
        "rejected" => Settled::Rejected(value),
        _ => Settled::Pending,
    })
}

impl SynchronousWorker {
    fn promise_inspector(&self, context: &mut Context) -> WorkerResult<JsObject> {
        if let Some(inspector) = self.inner.promise_inspector.borrow().as_ref() {
            return Ok(inspector.clone());
        }
        let inspector = in_realm(context, &self.inner.realm, |context| {
            eval_script(INSPECTOR_SOURCE, context)
        })?;
        let inspector = inspector.as_callable().cloned().ok_or_else(|| {
            JsError::from(JsNativeError::typ().with_message("promise inspector is not callable"))
        })?;
        *self.inner.promise_inspector.borrow_mut() = Some(inspector.clone());
        Ok(inspector)
    }

    /// Steps the worker's loop until `promise` settles.
    ///
    /// Non-promise values settle immediately. A rejection comes back as
    /// [`WorkerError::Rejected`] carrying the rejection reason.
    ///
    /// # Errors
    ///
    /// [`WorkerError::NotExclusive`] unless the worker owns both its loop
    /// and its microtask queue; [`WorkerError::Stopped`] if the worker is
    /// stopped before the promise settles.
    pub fn run_loop_until_promise_resolved(
        &self,
        promise: &JsValue,
        context: &mut Context,
    ) -> WorkerResult<JsValue> {
        let inner = &self.inner;
        if !inner.loop_controller.is_owned() || !inner.microtasks.is_owned() {
            return Err(WorkerError::NotExclusive);
        }
        if inner.is_terminating() {
            return Err(WorkerError::Stopped);
        }

        let inspector = self.promise_inspector(context)?;
        let record = self.run_in_callback_scope(context, |context| {
            inspector.call(&JsValue::undefined(), &[promise.clone()], context)
        })?;
        let record = record.as_object().cloned().ok_or(WorkerError::Stopped)?;

        loop {
            match read_record(&record, context)? {
                Settled::Fulfilled(value) => return Ok(value),
                Settled::Rejected(reason) => {
                    return Err(WorkerError::Rejected(JsError::from_opaque(reason)))
                }
                Settled::Pending => {}
            }
            if inner.is_terminating() {
                return Err(WorkerError::Stopped);
            }
            tracing::trace!(worker = inner.id, "promise pending, stepping loop");
            self.run_loop(RunMode::Once, context)?;
        }
    }
}
