//! Single-submission status lookup with rate-limit back-off.
//!
//! The remote API only offers a full listing, so resolving one submission
//! means fetching the list and searching it. When the API answers with a
//! rate-limit signal the resolver sleeps for the configured back-off and asks
//! again, in a loop, until it gets a real answer.

use std::sync::Arc;
use std::time::Duration;

use monitor_core::models::Submission;
use monitor_core::settings::MonitorConfig;
use monitor_data::source::{ApiError, SubmissionSource};

/// Looks up the current state of submissions for one competition.
pub struct StatusResolver {
    source: Arc<dyn SubmissionSource>,
    competition: String,
    /// Wait after a rate-limited request before retrying.
    backoff: Duration,
    /// Consecutive rate-limited attempts tolerated; `None` for no limit.
    max_retries: Option<u32>,
}

impl StatusResolver {
    pub fn new(source: Arc<dyn SubmissionSource>, config: &MonitorConfig) -> Self {
        Self {
            source,
            competition: config.competition.clone(),
            backoff: config.error_wait_time,
            max_retries: config.max_rate_limit_retries,
        }
    }

    /// Fetch the full listing once, newest first. No retry.
    pub async fn list(&self) -> Result<Vec<Submission>, ApiError> {
        self.source.list_submissions(&self.competition).await
    }

    /// Current snapshot of `submission_ref`, or `None` if it is not listed.
    ///
    /// Rate-limit responses are absorbed by sleeping and retrying. Every other
    /// error is returned unchanged.
    pub async fn resolve(&self, submission_ref: &str) -> Result<Option<Submission>, ApiError> {
        let mut rate_limited = 0u32;
        loop {
            match self.list().await {
                Ok(submissions) => {
                    return Ok(submissions
                        .into_iter()
                        .find(|s| s.submission_ref == submission_ref));
                }
                Err(ApiError::RateLimited) => {
                    rate_limited += 1;
                    if self.max_retries.is_some_and(|max| rate_limited > max) {
                        tracing::warn!(
                            submission_ref,
                            attempts = rate_limited,
                            "still rate limited; giving up on this lookup"
                        );
                        return Err(ApiError::RateLimited);
                    }
                    tracing::warn!(
                        submission_ref,
                        wait_secs = self.backoff.as_secs(),
                        "API rate limit reached; waiting before retry"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
