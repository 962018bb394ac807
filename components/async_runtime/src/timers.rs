//! JavaScript timer bindings.
//!
//! Installs `setTimeout`, `setInterval`, `setImmediate`, their `clear*`
//! counterparts and `queueMicrotask` on the global object of the realm that
//! is current when [`install_timers`] runs.

use crate::{CallbackScope, EventLoop, MicrotaskQueue};
use boa_engine::job::NativeJob;
use boa_engine::object::FunctionObjectBuilder;
use boa_engine::realm::Realm;
use boa_engine::{
    Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction,
};
use boa_gc::{Finalize, Trace};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Largest delay accepted by the timer functions, in milliseconds.
pub const MAX_TIMER_DELAY_MS: f64 = 2_147_483_647.0;

/// Where timer functions schedule their work.
pub struct TimerBindings {
    /// Loop receiving timers and immediates
    pub event_loop: Rc<EventLoop>,
    /// Queue receiving `queueMicrotask` jobs
    pub microtasks: Rc<MicrotaskQueue>,
    /// Scope the callbacks run under
    pub scope: Weak<dyn CallbackScope>,
}

impl TimerBindings {
    fn scope(&self) -> JsResult<Rc<dyn CallbackScope>> {
        self.scope.upgrade().ok_or_else(|| {
            JsNativeError::error()
                .with_message("Timer scope has been released")
                .into()
        })
    }
}

#[derive(Clone, Trace, Finalize)]
struct Captures {
    #[unsafe_ignore_trace]
    bindings: Rc<TimerBindings>,
    realm: Realm,
}

type TimerFn = fn(&JsValue, &[JsValue], &Captures, &mut Context) -> JsResult<JsValue>;

/// Installs the timer functions into the current realm's global object.
pub fn install_timers(bindings: Rc<TimerBindings>, context: &mut Context) -> JsResult<()> {
    let captures = Captures {
        bindings,
        realm: context.realm().clone(),
    };
    let functions: [(&str, usize, TimerFn); 7] = [
        ("setTimeout", 2, set_timeout),
        ("setInterval", 2, set_interval),
        ("setImmediate", 1, set_immediate),
        ("clearTimeout", 1, clear_timer),
        ("clearInterval", 1, clear_timer),
        ("clearImmediate", 1, clear_immediate),
        ("queueMicrotask", 1, queue_microtask),
    ];

    let global = context.global_object();
    for (name, length, body) in functions {
        let function = FunctionObjectBuilder::new(
            context.realm(),
            NativeFunction::from_copy_closure_with_captures(body, captures.clone()),
        )
        .name(JsString::from(name))
        .length(length)
        .build();
        global.set(JsString::from(name), function, false, context)?;
    }
    Ok(())
}

fn callable_arg(args: &[JsValue], name: &str) -> JsResult<JsObject> {
    args.get_or_undefined(0)
        .as_callable()
        .cloned()
        .ok_or_else(|| {
            JsNativeError::typ()
                .with_message(format!("The \"callback\" argument of {name} must be a function"))
                .into()
        })
}

fn delay_arg(args: &[JsValue], context: &mut Context) -> JsResult<Duration> {
    let raw = args.get_or_undefined(1).to_number(context)?;
    let ms = if raw.is_nan() || raw < 1.0 || raw > MAX_TIMER_DELAY_MS {
        1.0
    } else {
        raw.trunc()
    };
    Ok(Duration::from_millis(ms as u64))
}

fn id_arg(args: &[JsValue]) -> Option<u64> {
    args.get_or_undefined(0)
        .as_number()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
}

fn timer_body(
    function: JsObject,
    rest: Vec<JsValue>,
) -> Rc<dyn Fn(&mut Context) -> JsResult<()>> {
    Rc::new(move |context| {
        function.call(&JsValue::undefined(), &rest, context)?;
        Ok(())
    })
}

fn set_timeout(
    _: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let function = callable_arg(args, "setTimeout")?;
    let delay = delay_arg(args, context)?;
    let rest = args.get(2..).unwrap_or_default().to_vec();
    let scope = captures.bindings.scope()?;
    let id = captures
        .bindings
        .event_loop
        .set_timeout(&scope, delay, timer_body(function, rest));
    Ok(JsValue::from(id as f64))
}

fn set_interval(
    _: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let function = callable_arg(args, "setInterval")?;
    let period = delay_arg(args, context)?;
    let rest = args.get(2..).unwrap_or_default().to_vec();
    let scope = captures.bindings.scope()?;
    let id = captures
        .bindings
        .event_loop
        .set_interval(&scope, period, timer_body(function, rest));
    Ok(JsValue::from(id as f64))
}

fn set_immediate(
    _: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let function = callable_arg(args, "setImmediate")?;
    let rest = args.get(1..).unwrap_or_default().to_vec();
    let scope = captures.bindings.scope()?;
    let id = captures.bindings.event_loop.set_immediate(
        &scope,
        Box::new(move |context| {
            function.call(&JsValue::undefined(), &rest, context)?;
            Ok(())
        }),
    );
    Ok(JsValue::from(id as f64))
}

fn clear_timer(
    _: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    if let Some(id) = id_arg(args) {
        captures.bindings.event_loop.clear_timer(id);
    }
    Ok(JsValue::undefined())
}

fn clear_immediate(
    _: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    if let Some(id) = id_arg(args) {
        captures.bindings.event_loop.clear_immediate(id);
    }
    Ok(JsValue::undefined())
}

fn queue_microtask(
    _: &JsValue,
    args: &[JsValue],
    captures: &Captures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let function = callable_arg(args, "queueMicrotask")?;
    let scope = captures.bindings.scope.clone();
    let job = NativeJob::with_realm(
        move |context| {
            if let Some(scope) = scope.upgrade() {
                if !scope.is_terminating() {
                    scope.invoke(
                        Box::new(move |context| {
                            function.call(&JsValue::undefined(), &[], context)?;
                            Ok(())
                        }),
                        context,
                    );
                }
            }
            Ok(JsValue::undefined())
        },
        captures.realm.clone(),
        context,
    );
    captures.bindings.microtasks.enqueue(job);
    Ok(JsValue::undefined())
}
