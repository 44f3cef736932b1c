//! Core types for the submission monitor.
//!
//! Holds the submission model, error types, CLI settings, display-time
//! helpers, the persisted ledger of processed submissions, and the
//! notification contract shared by the data and runtime layers.

pub mod error;
pub mod ledger;
pub mod models;
pub mod notifications;
pub mod settings;
pub mod time_utils;

pub use error::{MonitorError, Result};
