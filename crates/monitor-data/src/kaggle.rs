//! Kaggle REST client for competition submission listings.

use std::time::Duration;

use monitor_core::models::{Submission, SubmissionStatus};
use monitor_core::time_utils::parse_timestamp;
use serde::Deserialize;
use serde_json::Value;

use crate::credentials::Credentials;
use crate::source::{ApiError, SubmissionSource};

/// Public Kaggle API root.
pub const DEFAULT_BASE_URL: &str = "https://www.kaggle.com/api/v1";

/// HTTP request timeout for a single listing call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Wire format ───────────────────────────────────────────────────────────────

/// One entry of `GET /competitions/submissions/list/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSubmission {
    /// Numeric in practice; strings are accepted too.
    #[serde(rename = "ref")]
    submission_ref: Value,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    /// A decimal string, a number, or null/empty before scoring.
    #[serde(default)]
    public_score: Option<Value>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ApiSubmission {
    fn into_submission(self) -> Result<Submission, ApiError> {
        let submission_ref = match &self.submission_ref {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ApiError::Decode(format!(
                    "unexpected submission ref: {}",
                    other
                )))
            }
        };

        let date = self.date.as_deref().unwrap_or_default();
        let submitted_at = parse_timestamp(date).ok_or_else(|| {
            ApiError::Decode(format!(
                "submission {} has unparseable date \"{}\"",
                submission_ref, date
            ))
        })?;

        let status = self
            .status
            .as_deref()
            .map(SubmissionStatus::parse)
            .unwrap_or(SubmissionStatus::Running);

        Ok(Submission {
            submission_ref,
            submitted_at,
            status,
            description: self.description,
            score: self.public_score.as_ref().and_then(score_from_value),
            file_name: self.file_name,
            error_description: self.error_description,
        })
    }
}

fn score_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Decode a listing response body.
pub fn parse_submissions(body: &str) -> Result<Vec<Submission>, ApiError> {
    let raw: Vec<ApiSubmission> =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    raw.into_iter().map(ApiSubmission::into_submission).collect()
}

// ── KaggleClient ──────────────────────────────────────────────────────────────

/// Authenticated client for the Kaggle competitions API.
pub struct KaggleClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl KaggleClient {
    /// Client against the public API.
    pub fn new(credentials: Credentials) -> Result<Self, ApiError> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    /// Client against an alternative API root (proxies, test servers).
    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("submission-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn listing_url(&self, competition: &str) -> String {
        format!(
            "{}/competitions/submissions/list/{}",
            self.base_url, competition
        )
    }
}

#[async_trait::async_trait]
impl SubmissionSource for KaggleClient {
    async fn list_submissions(&self, competition: &str) -> Result<Vec<Submission>, ApiError> {
        let url = self.listing_url(competition);
        tracing::debug!(%url, "listing submissions");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_submissions(&body)
    }
}
