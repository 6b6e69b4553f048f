//! # trialmart-core
//!
//! Core library for trialmart - trial activation analytics over a
//! behavioral event log.
//!
//! This library provides:
//! - CSV event log parsing
//! - SQLite storage with raw, staging and mart tables
//! - Goal and activation derivation
//! - Consistency checks and trial metrics
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way through four tables, all rebuilt on every load:
//! - **Raw:** `behavioral_events`, one row per CSV record
//! - **Staging:** `staging_behavioral_events`, surrogate-keyed copy
//! - **Marts:** `trial_goals` and `trial_activation`
//!
//! Metrics only read the tables.
//!
//! ## Example
//!
//! ```rust,no_run
//! use trialmart_core::analytics::MetricsReport;
//! use trialmart_core::ingest::Loader;
//! use trialmart_core::{Config, Database};
//! use std::path::Path;
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! Loader::new(&db)
//!     .load_path(Path::new("events.csv"))
//!     .expect("failed to load events");
//! let report = MetricsReport::compute(&db, 30).expect("failed to compute metrics");
//! println!("activation rate: {}", report.activation_rate);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use ingest::{LoadResult, Loader};
pub use types::*;

// Public modules
pub mod analytics;
pub mod check;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod ingest;
pub mod logging;
pub mod mart;
pub mod types;
