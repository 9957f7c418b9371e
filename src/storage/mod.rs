//! Storage layer for Sandloop - SQLite-backed persistence.
//!
//! One database holds three tables:
//! - `messages`: conversation turns and run outcomes
//! - `fragments`: generated code owned 1:1 by a result message
//! - `steps`: checkpointed step outputs keyed by (run_id, step_id)

mod messages;
mod steps;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Result, SandloopError};

pub use messages::MessageStore;
pub use steps::{MemoryStepStore, StepRecord, StepStore};

/// Wrapper around a rusqlite connection providing interior mutability.
///
/// `rusqlite::Connection` isn't Sync, so it sits behind a `Mutex`; SQLite
/// operations are quick and need exclusive access anyway.
pub struct Database {
    inner: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open or create a database at the given path, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            inner: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                type TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages(conversation_id, created_at);

            CREATE TABLE IF NOT EXISTS fragments (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL UNIQUE REFERENCES messages(id) ON DELETE CASCADE,
                sandbox_url TEXT NOT NULL,
                title TEXT NOT NULL,
                files TEXT NOT NULL,
                summary TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS steps (
                run_id TEXT NOT NULL,
                step_id TEXT NOT NULL,
                output TEXT NOT NULL,
                completed_at INTEGER NOT NULL,
                PRIMARY KEY (run_id, step_id)
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner.lock().map_err(|e| SandloopError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("sandloop.db");
        let _db = Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sandloop.db");
        {
            let _db = Database::open(&path).unwrap();
        }
        let _db = Database::open(&path).unwrap();
    }

    #[test]
    fn test_debug_does_not_expose_connection() {
        let db = Database::open_in_memory().unwrap();
        assert!(format!("{:?}", db).starts_with("Database"));
    }
}
