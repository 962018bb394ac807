//! Error types for parsing shared vocabulary.

use thiserror::Error;

/// Returned when a string does not name a known [`RunMode`](crate::RunMode).
///
/// # Examples
///
/// ```
/// use core_types::RunMode;
///
/// let err = "forever".parse::<RunMode>().unwrap_err();
/// assert_eq!(err.input, "forever");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown run mode '{input}', expected one of: default, once, nowait")]
pub struct ParseRunModeError {
    /// The rejected input
    pub input: String,
}
