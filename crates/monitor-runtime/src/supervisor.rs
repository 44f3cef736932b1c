//! Top-level discovery loop.
//!
//! The [`Supervisor`] lists the competition's submissions on a fixed cadence
//! and hands every submission that is neither recorded in the ledger nor
//! already being watched to a new monitor task. Monitor tasks live in a
//! [`JoinSet`] owned by the supervisor, so they can be reaped as they finish
//! and drained or aborted on shutdown.
//!
//! The loop never exits on error: rate limits are announced and waited out,
//! other failures are logged and waited out.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use monitor_core::ledger::Ledger;
use monitor_core::models::{Submission, SubmissionStatus};
use monitor_core::notifications::{Notification, Notifier};
use monitor_core::settings::MonitorConfig;
use monitor_data::source::{ApiError, SubmissionSource};
use tokio::task::{self, JoinError, JoinSet};

use crate::resolver::StatusResolver;
use crate::submission_monitor::{Clock, MonitorOutcome, SubmissionMonitor};

type MonitorResult = monitor_core::Result<MonitorOutcome>;

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Discovers submissions and owns one monitor task per unfinished ref.
pub struct Supervisor {
    config: MonitorConfig,
    resolver: Arc<StatusResolver>,
    monitor: Arc<SubmissionMonitor>,
    notifier: Arc<dyn Notifier>,
    ledger: Arc<Ledger>,
    /// Refs currently owned by a running monitor task.
    in_flight: HashSet<String>,
    /// Ref watched by each spawned task.
    task_refs: HashMap<task::Id, String>,
    tasks: JoinSet<MonitorResult>,
}

impl Supervisor {
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SubmissionSource>,
        notifier: Arc<dyn Notifier>,
        ledger: Arc<Ledger>,
    ) -> Self {
        let resolver = Arc::new(StatusResolver::new(source, &config));
        let monitor = Arc::new(SubmissionMonitor::new(
            Arc::clone(&resolver),
            Arc::clone(&notifier),
            Arc::clone(&ledger),
            &config,
        ));
        Self {
            config,
            resolver,
            monitor,
            notifier,
            ledger,
            in_flight: HashSet::new(),
            task_refs: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Replace the wall clock handed to monitor tasks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.monitor = Arc::new(
            SubmissionMonitor::new(
                Arc::clone(&self.resolver),
                Arc::clone(&self.notifier),
                Arc::clone(&self.ledger),
                &self.config,
            )
            .with_clock(clock),
        );
        self
    }

    /// Refs currently owned by a monitor task.
    pub fn in_flight(&self) -> &HashSet<String> {
        &self.in_flight
    }

    /// Number of monitor tasks not yet reaped.
    pub fn active_monitors(&self) -> usize {
        self.tasks.len()
    }

    // ── Run loop ──────────────────────────────────────────────────────────────

    /// Run the startup backfill and then the discovery loop until `shutdown`
    /// resolves.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(competition = %self.config.competition, "checking existing submissions...");
        let stopped = tokio::select! {
            _ = &mut shutdown => true,
            _ = self.backfill() => false,
        };

        if !stopped {
            tracing::info!("starting submission monitoring...");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = self.cycle() => {}
                }
            }
        }

        self.shutdown().await;
    }

    /// One discovery pass: reap, list, wait, dispatch, wait.
    pub async fn cycle(&mut self) {
        self.reap();

        match self.resolver.list().await {
            Ok(submissions) => {
                tokio::time::sleep(self.config.api_request_interval).await;
                self.dispatch(submissions);
                tokio::time::sleep(self.config.api_request_interval).await;
            }
            Err(ApiError::RateLimited) => {
                tracing::warn!(
                    wait_secs = self.config.error_wait_time.as_secs(),
                    "API rate limit reached while listing submissions"
                );
                let notice = Notification::RateLimited {
                    wait_secs: self.config.error_wait_time.as_secs(),
                };
                self.notifier
                    .notify(&notice.render(&self.config.display_zone))
                    .await;
                tokio::time::sleep(self.config.error_wait_time).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to list submissions");
                tokio::time::sleep(self.config.error_wait_time).await;
            }
        }
    }

    // ── Startup backfill ──────────────────────────────────────────────────────

    /// Inspect the newest submissions once at startup.
    ///
    /// Finished ones are recorded without notification; pending or running
    /// ones are announced. No monitors are spawned here. A running one is
    /// announced again as started once the discovery loop dispatches it. Any API error ends
    /// the backfill.
    pub async fn backfill(&self) {
        let submissions = match self.resolver.list().await {
            Ok(submissions) => submissions,
            Err(e) => {
                tracing::error!(error = %e, "error while checking existing submissions");
                return;
            }
        };

        for submission in submissions.into_iter().take(self.config.backfill_count) {
            let submission_ref = submission.submission_ref;
            if self.ledger.contains(&submission_ref) {
                continue;
            }

            let current = match self.resolver.resolve(&submission_ref).await {
                Ok(Some(current)) => current,
                Ok(None) => {
                    tracing::debug!(%submission_ref, "vanished during backfill");
                    tokio::time::sleep(self.config.api_request_interval).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "error while checking existing submissions");
                    return;
                }
            };

            tracing::info!(%submission_ref, status = %current.status, "existing submission");
            match current.status {
                SubmissionStatus::Complete => match self.ledger.mark_completed(&submission_ref) {
                    Ok(_) => {
                        tracing::info!(%submission_ref, "submission {} already complete", submission_ref)
                    }
                    Err(e) => tracing::error!(%submission_ref, error = %e, "failed to record"),
                },
                SubmissionStatus::Pending | SubmissionStatus::Running => {
                    let notice = Notification::DetectedInFlight {
                        submission: current,
                    };
                    self.notifier
                        .notify(&notice.render(&self.config.display_zone))
                        .await;
                }
                _ => {}
            }

            tokio::time::sleep(self.config.api_request_interval).await;
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Spawn a monitor for every submission not recorded and not in flight.
    ///
    /// Returns the number of monitors launched.
    pub fn dispatch(&mut self, submissions: Vec<Submission>) -> usize {
        let mut launched = 0;
        for submission in submissions {
            let submission_ref = submission.submission_ref.clone();
            if self.ledger.contains(&submission_ref) || self.in_flight.contains(&submission_ref) {
                continue;
            }

            let monitor = Arc::clone(&self.monitor);
            let handle = self
                .tasks
                .spawn(async move { monitor.run(submission).await });

            tracing::info!(%submission_ref, "started monitoring submission {}", submission_ref);
            self.task_refs.insert(handle.id(), submission_ref.clone());
            self.in_flight.insert(submission_ref);
            launched += 1;
        }
        launched
    }

    /// Collect monitor tasks that have already finished.
    pub fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next_with_id() {
            self.on_task_finished(result);
        }
    }

    fn on_task_finished(&mut self, result: Result<(task::Id, MonitorResult), JoinError>) {
        let id = match &result {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let submission_ref = self.task_refs.remove(&id).unwrap_or_default();
        self.in_flight.remove(&submission_ref);

        match result {
            Ok((_, Ok(outcome))) => {
                tracing::debug!(%submission_ref, ?outcome, "monitor finished");
            }
            Ok((_, Err(e))) => {
                tracing::error!(
                    %submission_ref,
                    error = %e,
                    "monitor finished but the ledger could not be updated"
                );
            }
            Err(e) if e.is_cancelled() => {
                tracing::debug!(%submission_ref, "monitor cancelled");
            }
            Err(e) => {
                tracing::error!(%submission_ref, error = %e, "monitor task panicked");
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    /// Give monitors the configured grace period, then abort the rest.
    ///
    /// Returns the refs whose monitors were aborted, sorted.
    async fn shutdown(&mut self) -> Vec<String> {
        self.reap();
        if self.tasks.is_empty() {
            tracing::info!("supervisor stopped");
            return Vec::new();
        }

        let grace = self.config.shutdown_grace;
        if !grace.is_zero() {
            tracing::info!(
                monitors = self.tasks.len(),
                grace_secs = grace.as_secs(),
                "waiting for running monitors"
            );
            let _ = tokio::time::timeout(grace, async {
                while let Some(result) = self.tasks.join_next_with_id().await {
                    self.on_task_finished(result);
                }
            })
            .await;
        }

        let mut abandoned: Vec<String> = self.task_refs.drain().map(|(_, r)| r).collect();
        abandoned.sort();
        for submission_ref in &abandoned {
            tracing::warn!(%submission_ref, "abandoning monitor without a final notification");
        }

        self.tasks.shutdown().await;
        self.in_flight.clear();
        tracing::info!("supervisor stopped");
        abandoned
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scored, submission, submitted_at, RecordingNotifier, ScriptedSource, TokioClock};
    use std::time::Duration;
    use tempfile::TempDir;

    // ── helpers ───────────────────────────────────────────────────────────────

    struct Harness {
        _dir: TempDir,
        ledger: Arc<Ledger>,
        source: Arc<ScriptedSource>,
        notifier: Arc<RecordingNotifier>,
        supervisor: Supervisor,
    }

    fn harness(source: ScriptedSource, config: MonitorConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(Ledger::open(&dir.path().join("ledger.json")).unwrap());
        let source = Arc::new(source);
        let notifier = Arc::new(RecordingNotifier::default());
        let supervisor = Supervisor::new(
            config,
            Arc::clone(&source) as Arc<dyn SubmissionSource>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&ledger),
        )
        .with_clock(Arc::new(TokioClock::starting_at(submitted_at())));

        Harness {
            _dir: dir,
            ledger,
            source,
            notifier,
            supervisor,
        }
    }

    async fn settle() {
        // Paused clock: sleeping lets every runnable task make progress first.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // ── dispatch ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_no_duplicate_dispatch_while_in_flight() {
        let listing = vec![submission("1", SubmissionStatus::Pending)];
        let mut h = harness(
            ScriptedSource::repeating(listing.clone()),
            MonitorConfig::default(),
        );

        assert_eq!(h.supervisor.dispatch(listing.clone()), 1);
        assert_eq!(h.supervisor.dispatch(listing), 0);

        assert_eq!(h.supervisor.active_monitors(), 1);
        assert_eq!(h.supervisor.in_flight().len(), 1);
        assert!(h.supervisor.in_flight().contains("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_skips_recorded_refs() {
        let mut h = harness(ScriptedSource::new(vec![]), MonitorConfig::default());
        h.ledger.mark_completed("1").unwrap();

        let launched = h.supervisor.dispatch(vec![
            scored("1", 0.3),
            submission("2", SubmissionStatus::Pending),
        ]);

        assert_eq!(launched, 1);
        assert!(h.supervisor.in_flight().contains("2"));
        assert!(!h.supervisor.in_flight().contains("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_releases_finished_monitor() {
        let mut h = harness(
            ScriptedSource::repeating(vec![scored("1", 0.8)]),
            MonitorConfig::default(),
        );

        h.supervisor
            .dispatch(vec![submission("1", SubmissionStatus::Pending)]);
        settle().await;
        h.supervisor.reap();

        assert!(h.supervisor.in_flight().is_empty());
        assert_eq!(h.supervisor.active_monitors(), 0);
        assert!(h.ledger.contains("1"));
        assert_eq!(h.notifier.matching("✅").len(), 1);

        // Recorded now, so a later listing does not relaunch it.
        assert_eq!(h.supervisor.dispatch(vec![scored("1", 0.8)]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_ref_can_be_dispatched_again() {
        let mut h = harness(ScriptedSource::repeating(vec![]), MonitorConfig::default());

        h.supervisor
            .dispatch(vec![submission("1", SubmissionStatus::Pending)]);
        settle().await;
        h.supervisor.reap();

        assert!(h.supervisor.in_flight().is_empty());
        assert!(!h.ledger.contains("1"));
        assert_eq!(
            h.supervisor
                .dispatch(vec![submission("1", SubmissionStatus::Pending)]),
            1
        );
    }

    // ── backfill ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_backfill_records_complete_and_announces_pending() {
        let listing = vec![
            submission("3", SubmissionStatus::Pending),
            scored("2", 0.75),
            submission("1", SubmissionStatus::Error),
        ];
        let h = harness(ScriptedSource::repeating(listing), MonitorConfig::default());

        h.supervisor.backfill().await;

        assert!(h.ledger.contains("2"));
        assert!(!h.ledger.contains("3"));
        assert!(!h.ledger.contains("1"));
        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("📊"));
        assert!(messages[0].contains("Submission: 3"));
        assert_eq!(h.supervisor.active_monitors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_only_checks_newest_window() {
        let listing: Vec<_> = (0..8)
            .map(|i| scored(&(100 - i).to_string(), 0.5))
            .collect();
        let config = MonitorConfig {
            backfill_count: 5,
            ..MonitorConfig::default()
        };
        let h = harness(ScriptedSource::repeating(listing), config);

        h.supervisor.backfill().await;

        assert_eq!(h.ledger.len(), 5);
        assert!(h.ledger.contains("100"));
        assert!(!h.ledger.contains("95"));
        // One listing plus one resolve per submission in the window.
        assert_eq!(h.source.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_paces_refs_that_vanish() {
        let source = ScriptedSource::new(vec![
            Ok(vec![
                submission("2", SubmissionStatus::Pending),
                submission("1", SubmissionStatus::Pending),
            ]),
            Ok(vec![]),
        ]);
        let h = harness(source, MonitorConfig::default());
        let start = tokio::time::Instant::now();

        h.supervisor.backfill().await;

        assert_eq!(h.source.calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(h.notifier.messages().is_empty());
        assert!(h.ledger.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_at_startup_is_detected_then_started() {
        let h = harness(
            ScriptedSource::repeating(vec![submission("5", SubmissionStatus::Running)]),
            MonitorConfig::default(),
        );
        let notifier = Arc::clone(&h.notifier);

        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(400)))
            .await;

        let messages = notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("📊"));
        assert!(messages[1].contains("🚀"));
        assert!(messages.iter().all(|m| m.contains("Submission: 5")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_skips_recorded_refs() {
        let h = harness(
            ScriptedSource::repeating(vec![submission("1", SubmissionStatus::Pending)]),
            MonitorConfig::default(),
        );
        h.ledger.mark_completed("1").unwrap();

        h.supervisor.backfill().await;

        assert_eq!(h.source.calls(), 1);
        assert!(h.notifier.messages().is_empty());
    }

    // ── run loop ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_run_until_backfills_then_monitors_new_submissions() {
        let listing = vec![
            submission("2", SubmissionStatus::Pending),
            scored("1", 0.91),
        ];
        let h = harness(ScriptedSource::repeating(listing), MonitorConfig::default());
        let ledger = Arc::clone(&h.ledger);
        let notifier = Arc::clone(&h.notifier);

        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(1_000)))
            .await;

        assert!(ledger.contains("1"));
        assert!(!ledger.contains("2"));
        assert_eq!(notifier.matching("📊").len(), 1);
        assert!(notifier.matching("✅").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_listing_notifies_and_waits() {
        let source = ScriptedSource::new(vec![
            Ok(vec![]),
            Err(ApiError::RateLimited),
            Ok(vec![]),
        ]);
        let h = harness(source, MonitorConfig::default());
        let source = Arc::clone(&h.source);
        let notifier = Arc::clone(&h.notifier);

        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(350)))
            .await;

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("rate limit"));
        // Backfill, the throttled listing, and one listing after the 300 s wait.
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_listing_errors_are_logged_only() {
        let source = ScriptedSource::new(vec![
            Ok(vec![]),
            Err(ApiError::Http { status: 500 }),
            Ok(vec![]),
        ]);
        let h = harness(source, MonitorConfig::default());
        let source = Arc::clone(&h.source);
        let notifier = Arc::clone(&h.notifier);

        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(350)))
            .await;

        assert!(notifier.messages().is_empty());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_completes_during_run() {
        let source = ScriptedSource::new(vec![
            Ok(vec![]),
            Ok(vec![submission("7", SubmissionStatus::Pending)]),
            Ok(vec![submission("7", SubmissionStatus::Pending)]),
            Ok(vec![scored("7", 0.66)]),
        ]);
        let h = harness(source, MonitorConfig::default());
        let ledger = Arc::clone(&h.ledger);
        let notifier = Arc::clone(&h.notifier);

        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(1_000)))
            .await;

        assert!(ledger.contains("7"));
        let completed = notifier.matching("✅");
        assert_eq!(completed.len(), 1);
        assert!(completed[0].contains("LB score: 0.66"));
    }

    // ── shutdown ──────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_monitors_without_notification() {
        let h = harness(
            ScriptedSource::repeating(vec![submission("1", SubmissionStatus::Pending)]),
            MonitorConfig {
                backfill_count: 0,
                ..MonitorConfig::default()
            },
        );
        let ledger = Arc::clone(&h.ledger);
        let notifier = Arc::clone(&h.notifier);

        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(500)))
            .await;

        assert!(!ledger.contains("1"));
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_does_not_abandon_finished_monitors() {
        let mut h = harness(
            ScriptedSource::repeating(vec![
                submission("2", SubmissionStatus::Pending),
                scored("1", 0.8),
            ]),
            MonitorConfig::default(),
        );
        h.supervisor.dispatch(vec![
            submission("2", SubmissionStatus::Pending),
            submission("1", SubmissionStatus::Pending),
        ]);
        settle().await;

        // "1" recorded its result but was never reaped; "2" is still polling.
        let abandoned = h.supervisor.shutdown().await;

        assert_eq!(abandoned, vec!["2".to_string()]);
        assert!(h.ledger.contains("1"));
        assert!(h.supervisor.in_flight().is_empty());
        assert_eq!(h.supervisor.active_monitors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_grace_lets_monitor_finish() {
        let source = ScriptedSource::new(vec![
            Ok(vec![submission("1", SubmissionStatus::Pending)]),
            Ok(vec![submission("1", SubmissionStatus::Pending)]),
            Ok(vec![submission("1", SubmissionStatus::Pending)]),
            Ok(vec![scored("1", 0.5)]),
        ]);
        let config = MonitorConfig {
            backfill_count: 0,
            shutdown_grace: Duration::from_secs(600),
            ..MonitorConfig::default()
        };
        let h = harness(source, config);
        let ledger = Arc::clone(&h.ledger);
        let notifier = Arc::clone(&h.notifier);

        // The monitor is dispatched at 60 s and sees Complete at 120 s.
        h.supervisor
            .run_until(tokio::time::sleep(Duration::from_secs(90)))
            .await;

        assert!(ledger.contains("1"));
        assert_eq!(notifier.matching("✅").len(), 1);
    }
}
