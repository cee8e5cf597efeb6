//! Source removal policy.
//!
//! Each sink reports a [`SinkOutcome`]; the orchestrator sums them into an
//! error count and asks [`RemovalMode::should_remove`] whether the job may be
//! deleted from the source scheduler.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Result of handing a job to one sink. Only presence of a failure is
/// tracked, not its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Delivered, skipped because the sink is disabled, or simulated in a dry run.
    Done,
    Failed,
}

impl SinkOutcome {
    pub fn errors(self) -> u32 {
        match self {
            SinkOutcome::Done => 0,
            SinkOutcome::Failed => 1,
        }
    }
}

/// When to delete a migrated job from the source scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum RemovalMode {
    #[default]
    Never,
    Always,
    /// Only when every sink succeeded.
    OnSuccess,
    /// Only when at least one sink failed.
    OnError,
}

impl RemovalMode {
    pub fn should_remove(self, errors: u32) -> bool {
        match self {
            RemovalMode::Never => false,
            RemovalMode::Always => true,
            RemovalMode::OnSuccess => errors == 0,
            RemovalMode::OnError => errors > 0,
        }
    }
}

impl FromStr for RemovalMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(RemovalMode::Never),
            "always" => Ok(RemovalMode::Always),
            "success" => Ok(RemovalMode::OnSuccess),
            "error" => Ok(RemovalMode::OnError),
            _ => Err(ConfigError::InvalidRemovalMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for RemovalMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for RemovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemovalMode::Never => "never",
            RemovalMode::Always => "always",
            RemovalMode::OnSuccess => "success",
            RemovalMode::OnError => "error",
        };
        f.write_str(name)
    }
}
