//! Helpers for defining native functions and calling JavaScript methods.

use boa_engine::object::builtins::JsFunction;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::{Context, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction};
use boa_gc::Trace;

/// Body of a native function with captured state.
pub(crate) type NativeBody<T> = fn(&JsValue, &[JsValue], &T, &mut Context) -> JsResult<JsValue>;

/// Creates a native function in the current realm.
pub(crate) fn function<T>(
    name: &str,
    length: usize,
    body: NativeBody<T>,
    captures: T,
    context: &mut Context,
) -> JsFunction
where
    T: Trace + 'static,
{
    FunctionObjectBuilder::new(
        context.realm(),
        NativeFunction::from_copy_closure_with_captures(body, captures),
    )
    .name(JsString::from(name))
    .length(length)
    .build()
}

/// Creates a native function and stores it as `target[name]`.
pub(crate) fn define_function<T>(
    target: &JsObject,
    name: &str,
    length: usize,
    body: NativeBody<T>,
    captures: T,
    context: &mut Context,
) -> JsResult<()>
where
    T: Trace + 'static,
{
    let function = function(name, length, body, captures, context);
    target.set(JsString::from(name), function, true, context)?;
    Ok(())
}

/// Calls `target[name](...args)` with `target` as receiver.
pub(crate) fn call_method(
    target: &JsObject,
    name: &str,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let method = target.get(JsString::from(name), context)?;
    let method = method.as_callable().ok_or_else(|| {
        JsNativeError::typ().with_message(format!("{name} is not a function"))
    })?;
    method.call(&JsValue::from(target.clone()), args, context)
}

/// Evaluates `source` as global code of the current realm.
///
/// Runs through the realm's `eval` intrinsic as an indirect eval, which
/// starts from the realm's global environment instead of whatever frame is
/// executing. Safe to call from a native function invoked by JavaScript,
/// where a plain `Context::eval` would bind against the caller's scopes.
pub(crate) fn eval_script(source: &str, context: &mut Context) -> JsResult<JsValue> {
    let eval = context.intrinsics().objects().eval();
    eval.call(&JsValue::undefined(), &[JsString::from(source).into()], context)
}

/// Returns a fresh ordinary object of the current realm.
pub(crate) fn plain_object(context: &mut Context) -> JsObject {
    JsObject::with_object_proto(context.intrinsics())
}
