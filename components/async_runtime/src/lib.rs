//! Event loop and microtask queue primitives for embedded JavaScript.
//!
//! This crate provides the scheduling half of the worker runtime:
//! - [`EventLoop`] - timers, immediates, posted tasks and async handles,
//!   stepped in `default`, `once` or `nowait` mode
//! - [`MicrotaskQueue`] - FIFO of engine jobs drained at turn boundaries
//! - [`CallbackScope`] - the seam through which every loop callback runs,
//!   so that the owner of the callback decides which realm it runs in and
//!   where its errors go
//! - [`AsyncHandle`] - a `Send` handle that lets other threads post work
//!   into a loop and keeps that loop alive
//! - [`timers`] - JavaScript bindings (`setTimeout`, `setImmediate`,
//!   `queueMicrotask`, ...) over a loop and a queue
//!
//! # Examples
//!
//! ```
//! use async_runtime::{Callback, CallbackScope, EventLoop};
//! use boa_engine::Context;
//! use core_types::RunMode;
//! use std::cell::Cell;
//! use std::rc::{Rc, Weak};
//!
//! struct Direct(Cell<u32>);
//!
//! impl CallbackScope for Direct {
//!     fn scope_id(&self) -> u64 { 1 }
//!     fn invoke(&self, callback: Callback, context: &mut Context) {
//!         self.0.set(self.0.get() + 1);
//!         let _ = callback(context);
//!     }
//! }
//!
//! let mut context = Context::default();
//! let scope: Rc<dyn CallbackScope> = Rc::new(Direct(Cell::new(0)));
//! let event_loop = EventLoop::new("doc");
//! event_loop.set_immediate(&scope, Box::new(|_| Ok(())));
//! assert!(event_loop.is_alive());
//! let alive = event_loop.run(RunMode::Default, &mut context).unwrap();
//! assert!(!alive);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event_loop;
pub mod handle;
pub mod scope;
pub mod task_queue;
pub mod timers;

// Re-export main types at crate root
pub use error::LoopError;
pub use event_loop::{EventLoop, TimerId};
pub use handle::{AsyncHandle, RemoteTask};
pub use scope::{Callback, CallbackScope};
pub use task_queue::MicrotaskQueue;
pub use timers::{install_timers, TimerBindings};
