use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("HTTP server error: {0}")]
    Http(String),
}

pub type Result<T> = std::result::Result<T, ExporterError>;

/// Failure of a single call against a store instance.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(#[source] redis::RedisError),

    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        command: &'static str,
        timeout: Duration,
    },

    #[error("command error: {0}")]
    Command(#[source] redis::RedisError),

    #[error("unexpected reply to {command}: {detail}")]
    Reply {
        command: &'static str,
        detail: String,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True when the instance itself is unusable, as opposed to a single
    /// command being rejected.
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }

    pub fn reply(command: &'static str, detail: impl Into<String>) -> Self {
        Self::Reply {
            command,
            detail: detail.into(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
            Self::Connection(e)
        } else {
            Self::Command(e)
        }
    }
}

/// The collection step a [`QueryError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStep {
    Length,
    Groups,
    Pending,
    Consumers,
}

impl QueryStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Length => "stream length",
            Self::Groups => "consumer groups",
            Self::Pending => "pending messages",
            Self::Consumers => "consumers",
        }
    }
}

impl fmt::Display for QueryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store call that failed while collecting one stream (or one of its groups).
#[derive(Error, Debug)]
#[error("{step} query failed for stream '{stream}'{}: {source}", group_suffix(.group))]
pub struct QueryError {
    pub stream: String,
    pub group: Option<String>,
    pub step: QueryStep,
    #[source]
    pub source: StoreError,
}

impl QueryError {
    pub fn stream(stream: &str, step: QueryStep, source: StoreError) -> Self {
        Self {
            stream: stream.to_string(),
            group: None,
            step,
            source,
        }
    }

    pub fn group(stream: &str, group: &str, step: QueryStep, source: StoreError) -> Self {
        Self {
            stream: stream.to_string(),
            group: Some(group.to_string()),
            step,
            source,
        }
    }
}

fn group_suffix(group: &Option<String>) -> String {
    group
        .as_ref()
        .map(|g| format!(" (group '{g}')"))
        .unwrap_or_default()
}
