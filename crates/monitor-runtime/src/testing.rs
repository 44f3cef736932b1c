//! Fakes shared by the runtime tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use monitor_core::models::{Submission, SubmissionStatus};
use monitor_core::notifications::Notifier;
use monitor_data::source::{ApiError, SubmissionSource};

use crate::submission_monitor::Clock;

/// Submission time used by [`submission`].
pub fn submitted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn submission(submission_ref: &str, status: SubmissionStatus) -> Submission {
    Submission::new(submission_ref, submitted_at(), status)
}

pub fn scored(submission_ref: &str, score: f64) -> Submission {
    let mut sub = submission(submission_ref, SubmissionStatus::Complete);
    sub.score = Some(score);
    sub
}

// ── ScriptedSource ────────────────────────────────────────────────────────────

/// Replays a fixed sequence of listing results.
///
/// Once the script runs out, the last successful listing is returned forever
/// (an empty list if there never was one).
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Submission>, ApiError>>>,
    last_ok: Mutex<Vec<Submission>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<Submission>, ApiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last_ok: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with `listing`.
    pub fn repeating(listing: Vec<Submission>) -> Self {
        Self::new(vec![Ok(listing)])
    }

    /// Number of `list_submissions` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SubmissionSource for ScriptedSource {
    async fn list_submissions(&self, _competition: &str) -> Result<Vec<Submission>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(listing)) => {
                *self.last_ok.lock().unwrap() = listing.clone();
                Ok(listing)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last_ok.lock().unwrap().clone()),
        }
    }
}

// ── RecordingNotifier ─────────────────────────────────────────────────────────

/// Keeps every delivered message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Messages whose text contains `needle`.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.contains(needle))
            .collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

// ── TokioClock ────────────────────────────────────────────────────────────────

/// Wall clock that follows tokio's (possibly paused) timer.
pub struct TokioClock {
    origin: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
        self.origin + elapsed
    }
}

