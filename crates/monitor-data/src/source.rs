//! Remote submission listing contract.

use monitor_core::models::Submission;
use thiserror::Error;

/// Failure modes of the remote competition API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429: the API wants callers to slow down.
    #[error("API rate limit reached")]
    RateLimited,

    /// The credentials were rejected (HTTP 401/403).
    #[error("API rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Any other non-2xx response.
    #[error("API returned HTTP {status}")]
    Http { status: u16 },

    /// The request never produced a response (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited)
    }

    /// Map an HTTP status code to the matching error.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ApiError::RateLimited,
            401 | 403 => ApiError::Unauthorized(status),
            _ => ApiError::Http { status },
        }
    }
}

/// Anything that can list a competition's submissions, newest first.
#[async_trait::async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn list_submissions(&self, competition: &str) -> Result<Vec<Submission>, ApiError>;
}
