//! Error types for trialmart-core

use thiserror::Error;

/// Main error type for the trialmart-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parse error for a single event record
    #[error("parse error on line {line}: {message}")]
    Parse { line: u64, message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Derived tables disagree with their source
    #[error("consistency check failed: {0}")]
    Consistency(String),

    /// The connection mutex was poisoned by a panicking holder
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// Result type alias for trialmart-core
pub type Result<T> = std::result::Result<T, Error>;
