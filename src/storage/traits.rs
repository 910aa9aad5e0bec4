//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and
//! associated error types.

use crate::storage::{DocumentRecord, NewDocument, Project};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project already exists: {0}")]
    DuplicateProject(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Project and document persistence
///
/// Implementations must be safe to share between threads.
pub trait Storage: Send + Sync {
    // ===== Projects =====

    /// Registers a new project
    ///
    /// # Arguments
    ///
    /// * `name` - Unique project name
    /// * `source_url` - Root URL of the documentation site
    /// * `filter_patterns` - Newline-separated include regexes (may be empty)
    ///
    /// # Returns
    ///
    /// The ID of the newly created project
    fn create_project(&self, name: &str, source_url: &str, filter_patterns: &str)
        -> StorageResult<i64>;

    /// Looks up a project by name
    fn get_project(&self, name: &str) -> StorageResult<Project>;

    /// Lists all projects ordered by name
    fn list_projects(&self) -> StorageResult<Vec<Project>>;

    // ===== Documents =====

    /// Inserts a document and returns its ID
    fn insert_document(&self, document: &NewDocument) -> StorageResult<i64>;

    /// Lists a project's documents ordered by position
    fn list_documents(&self, project_id: i64) -> StorageResult<Vec<DocumentRecord>>;

    /// Deletes every document of a project, returning how many were removed
    fn delete_documents(&self, project_id: i64) -> StorageResult<usize>;

    /// Counts a project's documents
    fn count_documents(&self, project_id: i64) -> StorageResult<usize>;

    /// Highest document ID stored for a project, if any
    fn latest_document_id(&self, project_id: i64) -> StorageResult<Option<i64>>;

    /// Deletes a project's documents with an ID at or below `max_id`
    ///
    /// Used to retire the documents of an earlier crawl once a new one has
    /// been stored alongside them.
    fn delete_documents_through(&self, project_id: i64, max_id: i64) -> StorageResult<usize>;
}

/// Document sink used by the crawl orchestrator
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, document: &NewDocument) -> StorageResult<i64>;
}
