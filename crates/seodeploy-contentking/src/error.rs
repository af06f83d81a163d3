//! Error types for the ContentKing integration

use seodeploy_core::{SamplingError, SeoError, SnapshotError};
use thiserror::Error;

/// Errors talking to the ContentKing APIs
#[derive(Error, Debug)]
pub enum ContentKingError {
    /// An API key needed for the request is not configured
    #[error("ContentKing {0} API key is not configured")]
    MissingApiKey(&'static str),

    /// Non-success HTTP status, with the API's `message` when present
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Timeout or connection failure, after retries
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body was not what the API documents
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Other HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl ContentKingError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ContentKingError::Transport(_))
    }
}

impl From<reqwest::Error> for ContentKingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ContentKingError::Transport(err.to_string())
        } else if let Some(status) = err.status() {
            ContentKingError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ContentKingError::Decode(err.to_string())
        } else {
            ContentKingError::Http(err.to_string())
        }
    }
}

impl From<ContentKingError> for SeoError {
    fn from(err: ContentKingError) -> Self {
        match err {
            ContentKingError::MissingApiKey(_) => SeoError::Config(err.to_string()),
            other => SeoError::Http(other.to_string()),
        }
    }
}

impl From<ContentKingError> for SnapshotError {
    fn from(err: ContentKingError) -> Self {
        match err {
            ContentKingError::Decode(msg) => SnapshotError::Malformed(msg),
            other => SnapshotError::Query(other.to_string()),
        }
    }
}

pub(crate) fn fetch_error(source_url: &str, err: ContentKingError) -> SamplingError {
    SamplingError::Fetch {
        source_url: source_url.to_string(),
        reason: err.to_string(),
    }
}

/// Result type for ContentKing operations
pub type Result<T> = std::result::Result<T, ContentKingError>;
