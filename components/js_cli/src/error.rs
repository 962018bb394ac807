//! Error types for the CLI

use boa_engine::JsError;
use synchronous_worker::WorkerError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// An exception escaped the script
    #[error("Uncaught {0}")]
    Js(#[from] JsError),

    /// A worker operation failed
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// File I/O error
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// The `--options` JSON did not describe worker options
    #[error("Invalid worker options: {0}")]
    Options(#[from] serde_json::Error),

    /// The `--mode` value is not a run mode
    #[error(transparent)]
    Mode(#[from] core_types::ParseRunModeError),

    /// The operation needs a worker but the runtime runs in host mode
    #[error("No worker in host mode")]
    HostMode,

    /// REPL error
    #[error("REPL error: {0}")]
    Repl(String),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
