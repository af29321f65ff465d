use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the pipelines
/// can tell retryable failures from ones that isolate a channel or a ticker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// Retryable retrieval failure (rate limit, 5xx, network).
    #[error("transient fetch error on channel {channel}: {reason}")]
    TransientFetch { channel: String, reason: String },

    /// Retrieval failure that retrying will not fix (missing channel, no access).
    #[error("fetch error on channel {channel}: {reason}")]
    Fetch { channel: String, reason: String },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("missing or corrupt log {path}: {reason}")]
    MissingOrCorruptLog { path: String, reason: String },

    #[error("analysis failed for {ticker}: {reason}")]
    Analysis { ticker: String, reason: String },

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientFetch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
