//! Worker construction options.

use serde::{Deserialize, Serialize};

/// Ownership configuration of a worker's event loop and microtask queue.
///
/// Both flags default to `false`: a worker shares the host's loop and
/// queue unless asked otherwise. Serialized names follow the JavaScript
/// option object (`ownLoop`, `ownMicrotaskQueue`).
///
/// # Examples
///
/// ```
/// use core_types::WorkerOptions;
///
/// let options: WorkerOptions = serde_json::from_str(r#"{"ownLoop": true}"#).unwrap();
/// assert!(options.own_loop);
/// assert!(!options.own_microtask_queue);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerOptions {
    /// Worker gets its own event loop instead of the host's
    pub own_loop: bool,
    /// Worker gets its own microtask queue instead of the host's
    pub own_microtask_queue: bool,
}

impl WorkerOptions {
    /// Options with both an own loop and an own microtask queue.
    pub fn isolated() -> Self {
        Self {
            own_loop: true,
            own_microtask_queue: true,
        }
    }

    /// Set whether the worker owns its event loop
    pub fn with_own_loop(mut self, own: bool) -> Self {
        self.own_loop = own;
        self
    }

    /// Set whether the worker owns its microtask queue
    pub fn with_own_microtask_queue(mut self, own: bool) -> Self {
        self.own_microtask_queue = own;
        self
    }

    /// Returns true when both the loop and the queue are owned.
    pub fn is_isolated(&self) -> bool {
        self.own_loop && self.own_microtask_queue
    }
}
