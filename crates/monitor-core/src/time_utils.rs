use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Zone used for notification timestamps when none is configured (UTC+9).
pub const DEFAULT_DISPLAY_TIMEZONE: &str = "Asia/Tokyo";

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── DisplayZone ───────────────────────────────────────────────────────────────

/// Renders UTC timestamps in the operator's display timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZone {
    tz: Tz,
}

impl DisplayZone {
    /// Create a zone from an IANA name, or `"auto"` for the system zone.
    ///
    /// Unrecognised names fall back to [`DEFAULT_DISPLAY_TIMEZONE`] with a
    /// warning.
    pub fn new(tz_name: &str) -> Self {
        let resolved = if tz_name.eq_ignore_ascii_case("auto") {
            get_system_timezone()
        } else {
            tz_name.to_string()
        };
        let tz = resolved.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "DisplayZone: unrecognised timezone \"{}\", falling back to {}",
                resolved, DEFAULT_DISPLAY_TIMEZONE
            );
            Tz::Asia__Tokyo
        });
        Self { tz }
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Format as `YYYY-MM-DD HH:MM:SS <abbrev>`, e.g. `2025-03-01 21:00:00 JST`.
    pub fn format(&self, dt: DateTime<Utc>) -> String {
        dt.with_timezone(&self.tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
    }
}

impl Default for DisplayZone {
    fn default() -> Self {
        Self { tz: Tz::Asia__Tokyo }
    }
}

// ── Timestamp parsing ─────────────────────────────────────────────────────────

/// Parse an API timestamp into UTC.
///
/// Accepts RFC 3339 (with `Z` or an offset) and naive date-times, which are
/// taken to be UTC. Returns `None` for empty or unrecognised input.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const FMTS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    let naive_input = s.strip_suffix('Z').unwrap_or(s);
    for fmt in FMTS {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(naive_input, fmt) {
            return Some(naive.and_utc());
        }
    }

    warn!("could not parse timestamp \"{}\"", s);
    None
}

// ── Elapsed time ──────────────────────────────────────────────────────────────

/// Whole minutes since `submitted_at`, counted from 1.
///
/// `floor((now - submitted_at) / 60s) + 1`. A `now` earlier than
/// `submitted_at` (clock skew) reports 1.
pub fn elapsed_minutes(submitted_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (now - submitted_at).num_seconds().max(0);
    secs / 60 + 1
}
