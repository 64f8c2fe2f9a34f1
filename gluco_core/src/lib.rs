#![forbid(unsafe_code)]

//! Core domain model and alerting rules for the Gluco diabetes-care system.
//!
//! This crate provides:
//! - Domain types (patients, therapies, readings, intakes, alerts)
//! - The glucose anomaly classifier and medication adherence monitor
//! - Alert emission with physician routing
//! - Persistence (registry, JSONL journals) behind store traits
//! - Reports and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod validation;
pub mod journal;
pub mod registry;
pub mod store;
pub mod alert;
pub mod classifier;
pub mod adherence;
pub mod hooks;
pub mod report;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use registry::Registry;
pub use store::{AlertSink, FileStore, MemoryStore, RecordStore, RecordWriter};
pub use alert::{AlertDraft, AlertFilter, AlertOutcome};
pub use adherence::{run_adherence_monitor, MonitorReport};
pub use hooks::{prescribe_therapy, record_intake, record_reading};
pub use report::{build_report, GlucoseReport};
