//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the storage traits.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentStore, Storage, StorageError, StorageResult};
use crate::storage::{DocumentRecord, NewDocument, Project};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        source_url: row.get(2)?,
        filter_patterns: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        source_url: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        position: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl Storage for SqliteStorage {
    // ===== Projects =====

    fn create_project(
        &self,
        name: &str,
        source_url: &str,
        filter_patterns: &str,
    ) -> StorageResult<i64> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO projects (name, source_url, filter_patterns, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, source_url, filter_patterns, now],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StorageError::DuplicateProject(name.to_string())
            } else {
                StorageError::Sqlite(e)
            }
        })?;

        Ok(conn.last_insert_rowid())
    }

    fn get_project(&self, name: &str) -> StorageResult<Project> {
        self.conn()
            .query_row(
                "SELECT id, name, source_url, filter_patterns, created_at FROM projects WHERE name = ?1",
                params![name],
                project_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::ProjectNotFound(name.to_string()))
    }

    fn list_projects(&self) -> StorageResult<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, source_url, filter_patterns, created_at FROM projects ORDER BY name",
        )?;

        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    // ===== Documents =====

    fn insert_document(&self, document: &NewDocument) -> StorageResult<i64> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO documents (project_id, source_url, title, content, content_hash, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document.project_id,
                document.source_url,
                document.title,
                document.content,
                document.content_hash,
                document.position,
                now
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn list_documents(&self, project_id: i64) -> StorageResult<Vec<DocumentRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, project_id, source_url, title, content, content_hash, position, created_at
             FROM documents WHERE project_id = ?1 ORDER BY position, id",
        )?;

        let documents = stmt
            .query_map(params![project_id], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn delete_documents(&self, project_id: i64) -> StorageResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM documents WHERE project_id = ?1",
            params![project_id],
        )?;
        Ok(removed)
    }

    fn count_documents(&self, project_id: i64) -> StorageResult<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn latest_document_id(&self, project_id: i64) -> StorageResult<Option<i64>> {
        let id: Option<i64> = self.conn().query_row(
            "SELECT MAX(id) FROM documents WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn delete_documents_through(&self, project_id: i64, max_id: i64) -> StorageResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM documents WHERE project_id = ?1 AND id <= ?2",
            params![project_id, max_id],
        )?;
        Ok(removed)
    }
}

#[async_trait]
impl DocumentStore for SqliteStorage {
    async fn create_document(&self, document: &NewDocument) -> StorageResult<i64> {
        self.insert_document(document)
    }
}
