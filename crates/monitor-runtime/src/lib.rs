//! Runtime layer for the submission monitor.
//!
//! Hosts the status resolver, the per-submission monitor task, and the
//! supervisor that discovers submissions and owns the monitor tasks.

pub mod resolver;
pub mod submission_monitor;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use monitor_core as core;
pub use monitor_data as data;
