//! Storage module for persisting harvested documentation
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Project registration and lookup
//! - Document persistence for the crawl orchestrator

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DocumentStore, Storage, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A registered documentation source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub source_url: String,
    /// Newline-separated include regexes; empty means "include everything"
    pub filter_patterns: String,
    pub created_at: String,
}

/// A document ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub project_id: i64,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub position: i64,
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: i64,
    pub project_id: i64,
    pub source_url: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub position: i64,
    pub created_at: String,
}
