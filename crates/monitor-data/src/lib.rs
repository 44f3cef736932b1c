//! Remote I/O layer for the submission monitor.
//!
//! Defines the [`source::SubmissionSource`] contract and its Kaggle REST
//! implementation, credential discovery, and webhook notification delivery.

pub mod credentials;
pub mod kaggle;
pub mod source;
pub mod webhook;

pub use monitor_core as core;
