use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::ledger::DEFAULT_LEDGER_FILE;
use crate::time_utils::{DisplayZone, DEFAULT_DISPLAY_TIMEZONE};

/// Competition watched when none is given.
pub const DEFAULT_COMPETITION: &str = "birdclef-2025";

/// Seconds between API requests.
pub const DEFAULT_API_REQUEST_INTERVAL_SECS: u64 = 60;

/// Seconds to wait after a rate limit or other error.
pub const DEFAULT_ERROR_WAIT_TIME_SECS: u64 = 300;

/// Number of newest submissions examined at startup.
pub const DEFAULT_BACKFILL_COUNT: usize = 5;

/// Name of the per-user state directory under `$HOME`.
pub const STATE_DIR_NAME: &str = ".submission-monitor";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Watch competition submissions and notify on lifecycle changes
#[derive(Parser, Debug, Clone)]
#[command(
    name = "submission-monitor",
    about = "Watch competition submissions and notify on lifecycle changes",
    version
)]
pub struct Settings {
    /// Webhook URL that receives `{"content": ...}` notifications
    #[arg(long, env = "DISCORD_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Competition identifier
    #[arg(long, env = "KAGGLE_COMPETITION", default_value = DEFAULT_COMPETITION)]
    pub competition: String,

    /// Seconds between API requests
    #[arg(long, default_value_t = DEFAULT_API_REQUEST_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub api_request_interval: u64,

    /// Seconds to wait after a rate limit or API error
    #[arg(long, default_value_t = DEFAULT_ERROR_WAIT_TIME_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub error_wait_time: u64,

    /// Timezone used to display timestamps ("auto" for the system zone)
    #[arg(long, default_value = DEFAULT_DISPLAY_TIMEZONE, value_parser = parse_timezone)]
    pub timezone: String,

    /// Number of newest submissions checked at startup
    #[arg(long, default_value_t = DEFAULT_BACKFILL_COUNT)]
    pub backfill_count: usize,

    /// Ledger file of already-processed submissions
    #[arg(long)]
    pub ledger_file: Option<PathBuf>,

    /// Path to kaggle.json credentials
    #[arg(long)]
    pub kaggle_config: Option<PathBuf>,

    /// Give up after this many consecutive rate-limited status lookups
    #[arg(long)]
    pub max_rate_limit_retries: Option<u32>,

    /// Seconds to let running monitors finish after Ctrl+C
    #[arg(long, default_value_t = 0)]
    pub shutdown_grace: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Accept `"auto"` or a recognised IANA timezone name.
fn parse_timezone(raw: &str) -> Result<String, String> {
    if raw.eq_ignore_ascii_case("auto") || DisplayZone::validate_timezone(raw) {
        Ok(raw.to_string())
    } else {
        Err(format!("unknown timezone \"{raw}\" (expected an IANA name or \"auto\")"))
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments and normalise the result.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] but accepts an explicit argument list,
    /// enabling unit-testing without spawning subprocesses.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::normalise(Settings::parse_from(args))
    }

    /// Apply `--debug` and drop an empty webhook URL.
    fn normalise(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        if settings
            .webhook_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            settings.webhook_url = None;
        }

        settings
    }

    /// Ledger path: `--ledger-file`, or `~/.submission-monitor/completed_submissions.json`.
    pub fn ledger_path(&self) -> PathBuf {
        match &self.ledger_file {
            Some(path) => path.clone(),
            None => Self::state_dir().join(DEFAULT_LEDGER_FILE),
        }
    }

    /// `~/.submission-monitor/`, or `./.submission-monitor/` without a home dir.
    pub fn state_dir() -> PathBuf {
        Self::state_dir_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// State directory rooted at `base_dir` (used for testing).
    pub fn state_dir_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(STATE_DIR_NAME)
    }
}

// ── MonitorConfig ──────────────────────────────────────────────────────────────

/// Runtime parameters shared by the supervisor and its monitors.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub competition: String,
    /// Pause between successive API requests.
    pub api_request_interval: Duration,
    /// Back-off after a rate limit or transport error.
    pub error_wait_time: Duration,
    pub backfill_count: usize,
    /// `None` retries rate-limited lookups forever.
    pub max_rate_limit_retries: Option<u32>,
    /// How long in-flight monitors may keep running after shutdown is requested.
    pub shutdown_grace: Duration,
    pub display_zone: DisplayZone,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            competition: DEFAULT_COMPETITION.to_string(),
            api_request_interval: Duration::from_secs(DEFAULT_API_REQUEST_INTERVAL_SECS),
            error_wait_time: Duration::from_secs(DEFAULT_ERROR_WAIT_TIME_SECS),
            backfill_count: DEFAULT_BACKFILL_COUNT,
            max_rate_limit_retries: None,
            shutdown_grace: Duration::ZERO,
            display_zone: DisplayZone::default(),
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for MonitorConfig {
    fn from(s: &Settings) -> Self {
        MonitorConfig {
            competition: s.competition.clone(),
            api_request_interval: Duration::from_secs(s.api_request_interval),
            error_wait_time: Duration::from_secs(s.error_wait_time),
            backfill_count: s.backfill_count,
            max_rate_limit_retries: s.max_rate_limit_retries,
            shutdown_grace: Duration::from_secs(s.shutdown_grace),
            display_zone: DisplayZone::new(&s.timezone),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
