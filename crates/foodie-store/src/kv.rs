use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::{Result, StoreError};

/// String-keyed, string-valued persistent store
///
/// Get/set/absent semantics only. No transactions across keys and no
/// schema versioning of the values; callers own the encoding.
pub trait KvStore: Send + Sync {
    /// Value stored under `key`, or `None` if the key was never written
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite the value under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Drop `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Key-value store backed by a single SQLite table
///
/// SQLite was chosen because:
/// - Zero-config embedded database
/// - Survives process restarts without a separate service
/// - Atomic single-row upserts
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        debug!("Opening key-value store at {}", db_path.display());
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Throwaway store, handy for tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Initialize schema on first run
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Unix timestamp of the last write to `key`
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let ts = conn
            .query_row(
                "SELECT updated_at FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp()],
        )?;
        debug!("Wrote {} bytes to {}", value.len(), key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
