//! Error types for loop operations.

use thiserror::Error;

/// Errors returned by [`EventLoop`](crate::EventLoop) and
/// [`AsyncHandle`](crate::AsyncHandle).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    /// `run` was called while another `run` of the same loop is in flight
    #[error("Cannot nest calls to runLoop")]
    Reentrant,

    /// The loop was closed and accepts no further runs
    #[error("Event loop has been closed")]
    Closed,

    /// The receiving loop has been dropped
    #[error("Event loop is no longer accepting work")]
    Disconnected,
}
