//! Synchronously driven JavaScript workers.
//!
//! A [`SynchronousWorker`] is a second JavaScript environment living next to
//! the host's, inside the same engine context. The host decides when the
//! worker's event loop turns and when its microtasks run:
//! - [`HostRuntime`] - the engine context with its host realm, loop and queue
//! - [`SynchronousWorker`] - lifecycle, loop stepping, callback scopes,
//!   promise waiting, and `exit`/`error` events
//! - [`LoopController`] / [`MicrotaskController`] - owned or shared loop
//!   and microtask queue
//! - [`ExecutionContext`] - the embedded global, `process` and `require`
//!
//! # Examples
//!
//! ```
//! use core_types::{RunMode, WorkerOptions};
//! use synchronous_worker::{HostRuntime, SynchronousWorker};
//!
//! let mut host = HostRuntime::new().unwrap();
//! let worker = SynchronousWorker::new(&mut host, WorkerOptions::isolated()).unwrap();
//! let context = host.context_mut();
//!
//! let promise = worker
//!     .eval("new Promise((resolve) => setTimeout(() => resolve(42), 5))", context)
//!     .unwrap();
//! let value = worker.run_loop_until_promise_resolved(&promise, context).unwrap();
//! assert_eq!(value.as_number(), Some(42.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bindings;
pub mod context;
pub mod error;
pub mod events;
pub mod host;
pub mod loop_controller;
pub mod microtasks;
pub mod modules;
mod native;
mod process;
mod scope;
mod waiter;
pub mod worker;

pub use context::{ExecutionContext, LoadContext};
pub use error::{WorkerError, WorkerResult};
pub use events::WorkerEvent;
pub use host::{HostRuntime, HostShared, JobRouter, HOST_SCOPE_ID};
pub use loop_controller::LoopController;
pub use microtasks::MicrotaskController;
pub use modules::{ModuleFactory, ModuleRegistry, BUILTIN_MODULES};
pub use process::platform;
pub use worker::{Initializer, SynchronousWorker, WorkerBuilder};

pub use core_types::{RunMode, WorkerOptions, WorkerState};
