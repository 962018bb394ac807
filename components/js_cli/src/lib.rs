//! Command line front end for synchronous workers
//!
//! Runs a script inside a [`SynchronousWorker`](synchronous_worker::SynchronousWorker)
//! and drives its loop to completion, or runs a script in the host realm with
//! the `SynchronousWorker` constructor available.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod error;
pub mod repl;
pub mod runtime;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
