// src/state/db.rs
//! Found-blocks state database
//!
//! Workers append a record for every winning block *before* the relay
//! attempt: a duplicate row is harmless, a missing record of a found block
//! is not. Rows are keyed by insertion time and queryable by count.

use crate::utils::error::PoolError;
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Conventional name of the pre-database flat-file log.
pub const LEGACY_FOUND_BLOCKS_FILE: &str = "found_blocks.jsonl";

/// Returns the state database path under a data directory.
pub fn state_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("state").join("pool.db")
}

fn legacy_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("state").join(LEGACY_FOUND_BLOCKS_FILE)
}

/// Handle to the embedded state database
///
/// Multiple workers append concurrently; SQLite connections are not
/// thread-safe to share, so the connection sits behind a mutex.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Opens (and if necessary creates) the state database under `data_dir`.
    ///
    /// # Errors
    /// Returns `PoolError` if the state directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open(data_dir: &Path) -> Result<Self, PoolError> {
        let path = state_db_path(data_dir);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS found_blocks_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at_unix INTEGER NOT NULL,
                json TEXT NOT NULL
            );",
        )?;
        Ok(StateStore {
            conn: Mutex::new(conn),
        })
    }

    /// Appends one found-block record, stamped with the current unix time.
    pub fn record_found_block(&self, json: &str) -> Result<(), PoolError> {
        let created_at = unix_now();
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO found_blocks_log (created_at_unix, json) VALUES (?1, ?2)",
            (created_at, json),
        )?;
        Ok(())
    }

    /// Returns up to `count` most recent found-block records, newest first.
    pub fn recent_found_blocks(&self, count: usize) -> Result<Vec<String>, PoolError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt =
            conn.prepare("SELECT json FROM found_blocks_log ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map([count as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Deletes every found-block record, returning the number of rows removed.
    pub fn clear(&self) -> Result<usize, PoolError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let deleted = conn.execute("DELETE FROM found_blocks_log", [])?;
        Ok(deleted)
    }
}

/// Maintenance operation: clears all found-block records under `data_dir`
/// and removes the legacy flat-file log if present.
///
/// Returns the exact number of database rows removed. Legacy-file removal is
/// best effort: if the conventional location is gone or the file never
/// existed this is a no-op, and any other failure is logged, not raised.
pub fn clear_found_blocks(data_dir: &Path) -> Result<usize, PoolError> {
    let store = StateStore::open(data_dir)?;
    let deleted = store.clear()?;

    let legacy = legacy_log_path(data_dir);
    match fs::remove_file(&legacy) {
        Ok(()) => log::info!("removed legacy found-blocks log {}", legacy.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!(
            "could not remove legacy found-blocks log {}: {}",
            legacy.display(),
            e
        ),
    }

    Ok(deleted)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Records round-trip newest first and respect the count limit.
    #[test]
    fn test_record_and_query() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        store.record_found_block(r#"{"height":1}"#).unwrap();
        store.record_found_block(r#"{"height":2}"#).unwrap();
        store.record_found_block(r#"{"height":3}"#).unwrap();

        let recent = store.recent_found_blocks(2).unwrap();
        assert_eq!(recent, vec![r#"{"height":3}"#, r#"{"height":2}"#]);
    }

    /// Clearing reports the exact row count, removes the legacy flat file,
    /// and leaves an empty, re-openable store behind.
    #[test]
    fn test_clear_found_blocks() {
        let dir = TempDir::new().unwrap();
        {
            let store = StateStore::open(dir.path()).unwrap();
            store.record_found_block(r#"{"height":1}"#).unwrap();
        }

        let legacy = dir.path().join("state").join(LEGACY_FOUND_BLOCKS_FILE);
        std::fs::write(&legacy, "{}\n").unwrap();

        let deleted = clear_found_blocks(dir.path()).unwrap();
        assert_eq!(deleted, 1);
        assert!(!legacy.exists(), "legacy file still exists");

        let store = StateStore::open(dir.path()).unwrap();
        assert!(store.recent_found_blocks(10).unwrap().is_empty());
    }

    /// Clearing an empty store with no legacy file reports zero deletions.
    #[test]
    fn test_clear_empty_store() {
        let dir = TempDir::new().unwrap();
        assert_eq!(clear_found_blocks(dir.path()).unwrap(), 0);
    }
}
