//! Event loop stepping modes.

use crate::ParseRunModeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far a single `run` call drives an event loop.
///
/// | mode      | behaviour                                                  |
/// |-----------|------------------------------------------------------------|
/// | `Default` | run until nothing keeps the loop alive or stop is requested |
/// | `Once`    | one poll-and-dispatch pass, blocking for the next event     |
/// | `NoWait`  | one pass over ready work, never blocking                    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run until the loop drains or is stopped
    #[default]
    Default,
    /// Process at least one ready event, blocking if needed
    Once,
    /// Process ready events without blocking
    NoWait,
}

impl RunMode {
    /// Returns the canonical lowercase name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Default => "default",
            RunMode::Once => "once",
            RunMode::NoWait => "nowait",
        }
    }

    /// Returns true if a pass in this mode may wait for events.
    pub fn may_block(self) -> bool {
        !matches!(self, RunMode::NoWait)
    }

    /// Returns true if the mode stops after a single iteration.
    pub fn is_single_pass(self) -> bool {
        !matches!(self, RunMode::Default)
    }
}

impl FromStr for RunMode {
    type Err = ParseRunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(RunMode::Default),
            "once" => Ok(RunMode::Once),
            "nowait" => Ok(RunMode::NoWait),
            other => Err(ParseRunModeError {
                input: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
