//! Lifecycle notifications for monitored submissions.
//!
//! A [`Notification`] describes one lifecycle event and renders itself into
//! the human-readable text sent to the operator. Delivery goes through the
//! [`Notifier`] trait, which is best-effort: implementations log delivery
//! failures and never return them to the caller.

use chrono::{DateTime, Utc};

use crate::models::{Submission, SubmissionStatus};
use crate::time_utils::DisplayZone;

// ── Notifier ──────────────────────────────────────────────────────────────────

/// Outbound sink for rendered notification messages.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`. Failures are logged by the implementation.
    async fn notify(&self, message: &str);
}

/// Notifier used when no outbound sink is configured; writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        tracing::info!("notification (no webhook configured):\n{}", message);
    }
}

// ── Notification ──────────────────────────────────────────────────────────────

/// A lifecycle event worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// A submission was first observed while already running.
    Started { submission: Submission },
    /// Found at startup still pending or running; no monitor attached yet.
    DetectedInFlight { submission: Submission },
    /// The submission finished and has a score.
    Completed {
        submission: Submission,
        finished_at: DateTime<Utc>,
        elapsed_minutes: i64,
    },
    /// The submission finished with an error.
    Failed {
        submission: Submission,
        finished_at: DateTime<Utc>,
        elapsed_minutes: i64,
    },
    /// The remote API throttled the listing; the supervisor is backing off.
    RateLimited { wait_secs: u64 },
}

impl Notification {
    /// Render the message text with timestamps in `zone`.
    pub fn render(&self, zone: &DisplayZone) -> String {
        let mut lines = Vec::new();
        match self {
            Notification::Started { submission } => {
                lines.push("🚀 New submission started!".to_string());
                lines.push(format!("Submission: {}", submission.submission_ref));
                lines.push(format!("Started: {}", zone.format(submission.submitted_at)));
                lines.extend(info_lines(submission));
            }
            Notification::DetectedInFlight { submission } => {
                lines.push("📊 Detected a submission in progress".to_string());
                lines.push(format!("Submission: {}", submission.submission_ref));
                lines.push(format!("Started: {}", zone.format(submission.submitted_at)));
                lines.push(format!("Current status: {}", submission.status));
                lines.extend(info_lines(submission));
            }
            Notification::Completed {
                submission,
                finished_at,
                elapsed_minutes,
            } => {
                lines.push("✅ Submission complete!".to_string());
                lines.push(format!("Submission: {}", submission.submission_ref));
                lines.push(format!("Started: {}", zone.format(submission.submitted_at)));
                lines.push(format!("Completed: {}", zone.format(*finished_at)));
                lines.push(format!("Run time: {} min", elapsed_minutes));
                lines.push(format!("LB score: {}", format_score(submission.score)));
                lines.extend(info_lines(submission));
            }
            Notification::Failed {
                submission,
                finished_at,
                elapsed_minutes,
            } => {
                lines.push("❌ Submission failed".to_string());
                lines.push(format!("Submission: {}", submission.submission_ref));
                lines.push(format!("Started: {}", zone.format(submission.submitted_at)));
                lines.push(format!("Ended: {}", zone.format(*finished_at)));
                lines.push(format!("Run time: {} min", elapsed_minutes));
                if let Some(reason) = non_empty(&submission.error_description) {
                    lines.push(format!("Error: {}", reason));
                }
            }
            Notification::RateLimited { wait_secs } => {
                lines.push(format!(
                    "API rate limit reached. Waiting {}...",
                    format_wait(*wait_secs)
                ));
            }
        }
        lines.join("\n")
    }

    /// Ref of the submission this notification is about, if any.
    pub fn submission_ref(&self) -> Option<&str> {
        match self {
            Notification::Started { submission }
            | Notification::DetectedInFlight { submission }
            | Notification::Completed { submission, .. }
            | Notification::Failed { submission, .. } => Some(&submission.submission_ref),
            Notification::RateLimited { .. } => None,
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Optional description / file lines shared by several messages.
fn info_lines(submission: &Submission) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(description) = non_empty(&submission.description) {
        lines.push(format!("📝 Note: {}", description));
    }
    if let Some(file_name) = non_empty(&submission.file_name) {
        lines.push(format!("📁 File: {}", file_name));
    }
    lines
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(s) => s.to_string(),
        None => "n/a".to_string(),
    }
}

/// `300` → `"5 minutes"`, `45` → `"45 seconds"`.
fn format_wait(secs: u64) -> String {
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    } else {
        format!("{} seconds", secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
