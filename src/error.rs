// src/error.rs
// Batch-level error taxonomy. Per-record failures never reach this type:
// they are absorbed by the normalizer (dropped + logged) and only surface
// as `EmptyResult` when nothing survived.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Failed to authenticate with Reddit: {0}")]
    Auth(String),

    #[error("Subreddit not found: {0}")]
    NotFound(String),

    #[error("Reddit servers are currently unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("No posts were found or processed")]
    EmptyResult,

    #[error("Client disconnected before the batch finished")]
    Cancelled,

    #[error("Failed to encode export: {0}")]
    Export(String),
}

impl ScrapeError {
    /// Stable machine-readable kind, independent of the human message.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Auth(_) => "auth",
            ScrapeError::NotFound(_) => "not_found",
            ScrapeError::UpstreamUnavailable(_) => "upstream_unavailable",
            ScrapeError::EmptyResult => "empty_result",
            ScrapeError::Cancelled => "cancelled",
            ScrapeError::Export(_) => "export",
        }
    }

    /// Transient errors are retried once by the batch runner; everything
    /// else is terminal.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScrapeError::UpstreamUnavailable(_))
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::UpstreamUnavailable(err.to_string())
    }
}

impl From<csv::Error> for ScrapeError {
    fn from(err: csv::Error) -> Self {
        ScrapeError::Export(err.to_string())
    }
}
