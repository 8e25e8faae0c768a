use std::path::PathBuf;

use thiserror::Error;

/// Failures loading the process config or the check definitions
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,

    #[error("failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("check {name}: {reason}")]
    InvalidCheck { name: String, reason: String },

    #[error("check {name}: invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },

    #[error("check {name}: {source}")]
    InvalidRequest {
        name: String,
        #[source]
        source: probe::ValidationError,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("a check named {0} is already scheduled")]
    DuplicateCheck(String),
}

/// Failures of one relay batch
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("poll failed: {0}")]
    Poll(#[source] anyhow::Error),

    #[error("storage failed: {0}")]
    Store(#[source] anyhow::Error),

    #[error("offset commit failed: {0}")]
    Commit(#[source] anyhow::Error),
}

impl RelayError {
    /// Whether the failed batch comes back on the next poll. After a failed
    /// commit the batch is already stored and the next commit covers it.
    pub fn redelivers(&self) -> bool {
        matches!(self, RelayError::Store(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("publisher is closed")]
    Closed,
}
