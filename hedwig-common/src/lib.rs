//! # Hedwig Common Library
//!
//! Shared code for the Hedwig proposal handling service:
//! - Domain enumerations (reviewer roles, proposal states, JCMT bands)
//! - Entity collections with their validation and aggregation rules
//! - SQLite storage layer and the record reconciliation engine
//! - Configuration loading
//! - API request signing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod stats;
pub mod types;

pub use db::sync::{SyncCounts, SyncKey, SyncOptions};
pub use error::{Error, Result};
pub use types::collection::ResultCollection;
