use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the submission monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The ledger file exists but could not be read.
    #[error("Failed to read ledger {path}: {source}")]
    LedgerRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ledger could not be written back to disk.
    #[error("Failed to write ledger {path}: {source}")]
    LedgerWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// API credentials are missing or malformed.
    #[error("Credentials error: {0}")]
    Credentials(String),

}

/// Convenience alias used throughout the monitor crates.
pub type Result<T> = std::result::Result<T, MonitorError>;
