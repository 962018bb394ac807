//! Error types for worker operations

use boa_engine::{JsError, JsNativeError};
use thiserror::Error;

/// Errors surfaced by [`SynchronousWorker`](crate::SynchronousWorker)
/// operations.
///
/// Usage errors carry the same messages JavaScript callers see when they
/// misuse the binding.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A loop operation was attempted on a worker sharing the host loop
    #[error("Can only use .{0} when using a separate event loop")]
    SharedEventLoop(&'static str),

    /// Promise waiting needs both an own loop and an own microtask queue
    #[error(
        "Can only use .runLoopUntilPromiseResolved() when using a separate event loop and microtask queue"
    )]
    NotExclusive,

    /// The worker was stopped
    #[error("Worker has been stopped")]
    Stopped,

    /// `runLoop` was called from inside a `runLoop` of the same worker
    #[error("Cannot nest calls to runLoop")]
    NestedLoopRun,

    /// `runInCallbackScope` was called from inside another callback scope
    #[error("Cannot nest calls to runInCallbackScope")]
    NestedCallbackScope,

    /// The execution context is not (or no longer) available
    #[error("Worker not initialized")]
    NotInitialized,

    /// Allocating or loading the execution context failed
    #[error("Failed to start worker: {0}")]
    Startup(JsError),

    /// The awaited promise was rejected
    #[error("Promise rejected: {0}")]
    Rejected(JsError),

    /// An exception thrown by JavaScript code
    #[error("{0}")]
    Js(#[from] JsError),
}

impl From<WorkerError> for JsError {
    fn from(err: WorkerError) -> Self {
        match err {
            // Thrown values cross the boundary unchanged.
            WorkerError::Js(inner) | WorkerError::Rejected(inner) | WorkerError::Startup(inner) => {
                inner
            }
            other => JsNativeError::error().with_message(other.to_string()).into(),
        }
    }
}

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;
