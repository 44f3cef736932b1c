//! Per-submission lifecycle tracking.
//!
//! [`SubmissionMonitor::run`] drives one submission from first observation to
//! a terminal state:
//!
//! ```text
//! New ──(announce if running)──▶ Polling ──▶ Complete | Error | NotFound
//! ```
//!
//! `Complete` and `Error` are announced and then recorded in the [`Ledger`].
//! `NotFound` ends the monitor without a ledger write, so the submission can
//! be picked up again if it reappears in a later listing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use monitor_core::ledger::Ledger;
use monitor_core::models::{Submission, SubmissionStatus};
use monitor_core::notifications::{Notification, Notifier};
use monitor_core::settings::MonitorConfig;
use monitor_core::time_utils::{elapsed_minutes, DisplayZone};

use crate::resolver::StatusResolver;

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ── MonitorOutcome ────────────────────────────────────────────────────────────

/// How a monitor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The ref was already in the ledger; nothing was done.
    AlreadyRecorded,
    /// First observed in a terminal status; recorded without polling.
    AlreadyTerminal(SubmissionStatus),
    Completed,
    Failed,
    /// The submission disappeared from the listing.
    NotFound,
}

// ── SubmissionMonitor ─────────────────────────────────────────────────────────

/// Polls one submission at a time until it finishes.
///
/// A single monitor is shared by all monitor tasks; the per-submission state
/// lives inside each [`SubmissionMonitor::run`] call.
pub struct SubmissionMonitor {
    resolver: Arc<StatusResolver>,
    notifier: Arc<dyn Notifier>,
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    /// Pause between polls of a still-running submission.
    poll_interval: Duration,
    /// Pause after a failed lookup before polling again.
    error_wait: Duration,
    zone: DisplayZone,
}

impl SubmissionMonitor {
    pub fn new(
        resolver: Arc<StatusResolver>,
        notifier: Arc<dyn Notifier>,
        ledger: Arc<Ledger>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            resolver,
            notifier,
            ledger,
            clock: Arc::new(SystemClock),
            poll_interval: config.api_request_interval,
            error_wait: config.error_wait_time,
            zone: config.display_zone,
        }
    }

    /// Replace the wall clock used for elapsed-time reporting.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Track `submission` until it reaches a terminal state.
    ///
    /// Returns an error only when the final ledger write fails; the terminal
    /// notification has already been sent by then.
    pub async fn run(&self, submission: Submission) -> monitor_core::Result<MonitorOutcome> {
        let submission_ref = submission.submission_ref.clone();

        if self.ledger.contains(&submission_ref) {
            tracing::debug!(%submission_ref, "already recorded; skipping");
            return Ok(MonitorOutcome::AlreadyRecorded);
        }

        if !matches!(
            submission.status,
            SubmissionStatus::Complete | SubmissionStatus::Pending
        ) {
            self.send(Notification::Started {
                submission: submission.clone(),
            })
            .await;
        }

        if submission.status.is_terminal() {
            self.ledger.mark_completed(&submission_ref)?;
            tracing::info!(
                %submission_ref,
                status = %submission.status,
                "submission already finished when first seen; recorded"
            );
            return Ok(MonitorOutcome::AlreadyTerminal(submission.status));
        }

        loop {
            let latest = match self.resolver.resolve(&submission_ref).await {
                Ok(Some(latest)) => latest,
                Ok(None) => {
                    tracing::info!(%submission_ref, "submission {} not found", submission_ref);
                    return Ok(MonitorOutcome::NotFound);
                }
                Err(e) => {
                    tracing::warn!(
                        %submission_ref,
                        error = %e,
                        wait_secs = self.error_wait.as_secs(),
                        "status lookup failed; retrying later"
                    );
                    tokio::time::sleep(self.error_wait).await;
                    continue;
                }
            };

            let now = self.clock.now();
            let elapsed = elapsed_minutes(submission.submitted_at, now);

            match latest.status {
                SubmissionStatus::Complete => {
                    self.send(Notification::Completed {
                        submission: latest,
                        finished_at: now,
                        elapsed_minutes: elapsed,
                    })
                    .await;
                    self.ledger.mark_completed(&submission_ref)?;
                    return Ok(MonitorOutcome::Completed);
                }
                SubmissionStatus::Error => {
                    self.send(Notification::Failed {
                        submission: latest,
                        finished_at: now,
                        elapsed_minutes: elapsed,
                    })
                    .await;
                    self.ledger.mark_completed(&submission_ref)?;
                    return Ok(MonitorOutcome::Failed);
                }
                _ => {
                    tracing::info!(
                        %submission_ref,
                        elapsed_minutes = elapsed,
                        "submission {} - elapsed {} min",
                        submission_ref,
                        elapsed
                    );
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn send(&self, notification: Notification) {
        let message = notification.render(&self.zone);
        tracing::info!("\n{}", message);
        self.notifier.notify(&message).await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
