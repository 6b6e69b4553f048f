//! Database layer for trialmart
//!
//! This module provides the storage layer using SQLite with:
//! - Fixed table definitions for the raw, staging and mart layers
//! - Transactional drop/recreate/populate of a single table
//! - Read helpers shared by checks, metrics and tests

pub mod repo;
pub mod schema;

pub use repo::Database;
