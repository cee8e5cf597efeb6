//! Error types.
//!
//! Only fatal conditions are errors. Per-record sink failures are reported as
//! [`crate::removal::SinkOutcome`] values and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by a broker transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("failed to attach link to {address}: {reason}")]
    Attach { address: String, reason: String },

    #[error("send to {address} failed: {reason}")]
    Send { address: String, reason: String },

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("shutdown failed: {0}")]
    Close(String),

    #[error("reply channel has not been opened")]
    NoReplyChannel,
}

/// Invalid or missing configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source broker url is required")]
    MissingSourceBroker,

    #[error("invalid removal mode '{0}': expected never, always, success or error")]
    InvalidRemovalMode(String),

    #[error("invalid property filter '{0}': expected name=regex")]
    MalformedFilter(String),

    #[error("invalid pattern for property '{property}'")]
    InvalidPattern {
        property: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Yaml(#[from] serde_yaml::Error),
}

/// Fatal errors that abort a migration run.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("browse response is missing the scheduler id property '{property}'")]
    MissingJobId { property: &'static str },

    #[error("failed to prepare archive directory {path}")]
    ArchiveSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
