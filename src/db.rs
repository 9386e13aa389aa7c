//! Durable Storage Module
//!
//! SQLite database shared by the cache store and the offline write queue.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Error, Result};

// == Database ==
/// Single SQLite connection guarded by a mutex.
///
/// Every statement runs under the lock, so callers never observe a
/// half-applied transaction.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    // == Constructors ==
    /// Opens (or creates) the database file and runs migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Internal(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database. Used by tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // == Lock ==
    /// Acquires the connection.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Internal(format!("Database lock poisoned: {}", e)))
    }
}

/// Schema for generations, cached responses and the offline queue.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cache_entries (
    generation TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL,
    PRIMARY KEY (generation, request_key)
);

-- Current STATIC / DYNAMIC pointers, one row per kind
CREATE TABLE IF NOT EXISTS current_generations (
    kind TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS queued_operations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    method TEXT NOT NULL,
    target TEXT NOT NULL,
    body BLOB,
    content_type TEXT,
    attempts INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    last_error TEXT
);

CREATE INDEX IF NOT EXISTS idx_queued_operations_status
    ON queued_operations(status, seq);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_runs_migrations() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('generations', 'cache_entries', 'current_generations', 'queued_operations')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn test_open_file_is_reopenable() {
        let dir = std::env::temp_dir().join(format!("offline_orders_db_{}", uuid::Uuid::new_v4()));
        let path = dir.join("store.db");

        {
            let db = Database::open(&path).unwrap();
            db.lock()
                .unwrap()
                .execute(
                    "INSERT INTO generations (name, kind, created_at) VALUES ('g', 'static', 'now')",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM generations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let _ = std::fs::remove_dir_all(dir);
    }
}
