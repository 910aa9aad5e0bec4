//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Docharvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registered documentation sources
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    source_url TEXT NOT NULL,
    filter_patterns TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- Harvested pages, one row per saved document
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    source_url TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    position INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_project ON documents(project_id, position);
CREATE INDEX IF NOT EXISTS idx_documents_source_url ON documents(source_url);
"#;

/// Initializes the database schema
///
/// Creates all tables and indexes if they don't exist.
///
/// # Arguments
///
/// * `conn` - The SQLite connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
