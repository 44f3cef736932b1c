//! Persisted record of fully-processed submissions.
//!
//! The ledger is a flat JSON array of submission refs. Once a ref is recorded
//! it is never removed, so a submission is announced as finished at most once
//! for the lifetime of the file, including across restarts.
//!
//! Every [`Ledger::mark_completed`] rewrites the whole file immediately
//! (write-through). The in-memory set and the file are updated under one
//! mutex so that concurrent monitors cannot overwrite each other's entries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{MonitorError, Result};

/// File name used when no explicit ledger path is configured.
pub const DEFAULT_LEDGER_FILE: &str = "completed_submissions.json";

// ── Ledger ────────────────────────────────────────────────────────────────────

/// Shared, append-only set of processed submission refs.
///
/// # Example
///
/// ```no_run
/// use monitor_core::ledger::Ledger;
/// use std::path::Path;
///
/// let ledger = Ledger::open(Path::new("/tmp/completed_submissions.json")).unwrap();
/// if !ledger.contains("41297") {
///     ledger.mark_completed("41297").unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct Ledger {
    /// Path to the JSON file backing the set.
    path: PathBuf,
    /// In-memory copy of the persisted set.
    entries: Mutex<HashSet<String>>,
}

impl Ledger {
    // ── Construction ──────────────────────────────────────────────────────────

    /// Open the ledger at `path`, loading any previously recorded refs.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = Self::load(path)?;
        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "ledger loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    /// Read the persisted set from `path`.
    ///
    /// A missing file yields an empty set. A file that exists but cannot be
    /// read or parsed is an error.
    pub fn load(path: &Path) -> Result<HashSet<String>> {
        if !path.exists() {
            return Ok(HashSet::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| MonitorError::LedgerRead {
            path: path.to_path_buf(),
            source,
        })?;
        let refs: Vec<String> = serde_json::from_str(&content)?;
        Ok(refs.into_iter().collect())
    }

    // ── Public API ────────────────────────────────────────────────────────────

    /// Whether `submission_ref` has already been fully processed.
    pub fn contains(&self, submission_ref: &str) -> bool {
        self.lock().contains(submission_ref)
    }

    /// Record `submission_ref` as processed and write the set to disk.
    ///
    /// Returns `Ok(true)` when the ref was newly added and `Ok(false)` when it
    /// was already present, in which case nothing is written. On a write
    /// failure the ref stays out of the in-memory set so that memory and disk
    /// agree.
    pub fn mark_completed(&self, submission_ref: &str) -> Result<bool> {
        let mut entries = self.lock();
        if entries.contains(submission_ref) {
            return Ok(false);
        }

        entries.insert(submission_ref.to_string());
        if let Err(e) = self.persist(&entries) {
            entries.remove(submission_ref);
            return Err(e);
        }

        tracing::debug!(submission_ref, "ledger entry recorded");
        Ok(true)
    }

    /// Number of recorded refs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.lock().clone()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically write `entries` to the backing file (temp file + rename).
    fn persist(&self, entries: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<&String> = entries.iter().collect();
        sorted.sort();
        let json = serde_json::to_string(&sorted)?;

        let write_err = |source| MonitorError::LedgerWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(write_err)?;
        if let Err(source) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(write_err(source));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
