//! Engine-independent vocabulary shared by the worker runtime.
//!
//! This crate holds the small value types that every other component speaks:
//! how an event loop should be stepped, how a worker is configured, and which
//! lifecycle state it is in.
//!
//! # Overview
//!
//! - [`RunMode`] - Stepping mode for an event loop (`default`, `once`, `nowait`)
//! - [`WorkerOptions`] - Loop and microtask queue ownership of a worker
//! - [`WorkerState`] - Lifecycle state of a worker
//! - [`ParseRunModeError`] - Error for unrecognised run mode names
//!
//! # Examples
//!
//! ```
//! use core_types::{RunMode, WorkerOptions};
//!
//! let mode: RunMode = "once".parse().unwrap();
//! assert_eq!(mode, RunMode::Once);
//!
//! let options = WorkerOptions::default().with_own_loop(true);
//! assert!(options.own_loop);
//! assert!(!options.own_microtask_queue);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod mode;
mod options;
mod state;

pub use error::ParseRunModeError;
pub use mode::RunMode;
pub use options::WorkerOptions;
pub use state::WorkerState;
