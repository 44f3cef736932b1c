use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a remote submission.
///
/// The remote API reports statuses as strings whose spelling varies between
/// API versions (`"complete"`, `"COMPLETE"`, `"SubmissionStatus.COMPLETE"`).
/// Anything that is not one of the known values is treated as
/// [`SubmissionStatus::Running`], the implicit pre-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubmissionStatus {
    /// Queued upstream, not yet scoring.
    Pending,
    /// In progress under any other name.
    Running,
    /// Finished successfully; a score is available.
    Complete,
    /// Finished with an error.
    Error,
}

impl SubmissionStatus {
    /// `true` for `Complete` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionStatus::Complete | SubmissionStatus::Error)
    }

    /// Lower-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Running => "running",
            SubmissionStatus::Complete => "complete",
            SubmissionStatus::Error => "error",
        }
    }

    /// Parse a status string, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        let name = lower.strip_prefix("submissionstatus.").unwrap_or(&lower);
        match name {
            "pending" => SubmissionStatus::Pending,
            "complete" => SubmissionStatus::Complete,
            "error" => SubmissionStatus::Error,
            _ => SubmissionStatus::Running,
        }
    }
}

impl From<String> for SubmissionStatus {
    fn from(raw: String) -> Self {
        SubmissionStatus::parse(&raw)
    }
}

impl From<SubmissionStatus> for String {
    fn from(status: SubmissionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote job record as reported by the competition platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Opaque identifier, stable for the submission's lifetime.
    #[serde(rename = "ref")]
    pub submission_ref: String,
    /// When the submission was created upstream.
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
    /// Free-text note attached at submission time.
    #[serde(default)]
    pub description: Option<String>,
    /// Public leaderboard score, present once complete.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Upstream explanation for an `Error` status.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl Submission {
    /// Build a submission with only the required fields set.
    pub fn new(
        submission_ref: impl Into<String>,
        submitted_at: DateTime<Utc>,
        status: SubmissionStatus,
    ) -> Self {
        Self {
            submission_ref: submission_ref.into(),
            submitted_at,
            status,
            description: None,
            score: None,
            file_name: None,
            error_description: None,
        }
    }
}
