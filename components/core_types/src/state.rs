//! Worker lifecycle states.

use std::fmt;

/// Lifecycle state of a worker.
///
/// Transitions only move forward: `Created -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkerState {
    /// Allocated but not yet loaded
    Created,
    /// Loaded and accepting loop operations
    Running,
    /// Stop was signalled; terminal
    Stopped,
}

impl WorkerState {
    /// Returns true for the terminal state.
    pub fn is_stopped(self) -> bool {
        matches!(self, WorkerState::Stopped)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
