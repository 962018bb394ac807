//! The callback scope seam.
//!
//! Every callback the loop dispatches belongs to a scope. The loop never runs
//! a callback itself: it hands it to the owning scope, which enters the right
//! realm, runs it, and deals with whatever error comes out.

use boa_engine::{Context, JsResult};

/// A unit of deferred work run on the loop thread.
pub type Callback = Box<dyn FnOnce(&mut Context) -> JsResult<()>>;

/// Owner of loop callbacks.
///
/// Scopes are held weakly by the loop. A task whose scope has been dropped,
/// or whose scope reports [`is_terminating`](CallbackScope::is_terminating),
/// is discarded instead of dispatched.
pub trait CallbackScope {
    /// Stable identifier used to purge a scope's tasks from a shared loop.
    fn scope_id(&self) -> u64;

    /// Returns true once the scope stops accepting callbacks.
    fn is_terminating(&self) -> bool {
        false
    }

    /// Runs `callback` inside this scope.
    ///
    /// Errors must be handled here; nothing propagates back into the loop.
    fn invoke(&self, callback: Callback, context: &mut Context);
}
