//! SQLite-backed key-value storage.
//!
//! All persistent state lives in one `kv` table:
//! - `interval_id`: selected interval
//! - `log_entries`: JSON array of log entries
//! - `current_interval_seconds`: total length of the armed timer
//! - `timer_start_time`: epoch seconds of the current run, absent when idle
//! - `timer_state`: full serialized timer engine state

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, DecodingError, Result};
use crate::interval::IntervalCatalog;
use crate::log::{LogBackend, LogEntry};
use crate::timer::PersistedTimer;

pub const KEY_INTERVAL_ID: &str = "interval_id";
pub const KEY_LOG_ENTRIES: &str = "log_entries";
pub const KEY_CURRENT_INTERVAL_SECONDS: &str = "current_interval_seconds";
pub const KEY_TIMER_START_TIME: &str = "timer_start_time";
pub const KEY_TIMER_STATE: &str = "timer_state";

/// How long a write waits on another process holding the lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database holding all Checkpoint state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/checkpoint.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("checkpoint.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Opened database");
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    // ── Key-value store ──────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Interval selection ───────────────────────────────────────────

    /// Saved interval id, or `fallback` (itself resolved against the
    /// catalog) if none is saved or the saved id is no longer offered.
    pub fn load_interval_id(&self, catalog: &IntervalCatalog, fallback: &str) -> String {
        match self.kv_get(KEY_INTERVAL_ID) {
            Ok(Some(id)) if catalog.contains(&id) => id,
            Ok(Some(id)) => {
                debug!(%id, "Saved interval not in catalog; using default");
                catalog.resolve(fallback).id.clone()
            }
            Ok(None) => catalog.resolve(fallback).id.clone(),
            Err(err) => {
                warn!(error = %err, "Failed to read saved interval; using default");
                catalog.resolve(fallback).id.clone()
            }
        }
    }

    pub fn save_interval_id(&self, id: &str) -> Result<()> {
        self.kv_set(KEY_INTERVAL_ID, id)?;
        Ok(())
    }

    // ── Timer state ──────────────────────────────────────────────────

    /// Stored timer state. Unreadable state is logged and ignored.
    pub fn load_timer(&self) -> Option<PersistedTimer> {
        let raw = match self.kv_get(KEY_TIMER_STATE) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %err, "Failed to read timer state");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(saved) => Some(saved),
            Err(err) => {
                warn!(error = %err, "Stored timer state unreadable; starting fresh");
                None
            }
        }
    }

    /// Persist the timer state and its summary keys in one transaction.
    pub fn save_timer(&self, timer: &PersistedTimer) -> Result<()> {
        let json = serde_json::to_string(timer)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![KEY_TIMER_STATE, json],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![KEY_CURRENT_INTERVAL_SECONDS, (timer.total_ms / 1000).to_string()],
        )?;
        match timer.started_at_epoch_secs() {
            Some(secs) => tx.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![KEY_TIMER_START_TIME, secs.to_string()],
            )?,
            None => tx.execute("DELETE FROM kv WHERE key = ?1", params![KEY_TIMER_START_TIME])?,
        };
        tx.commit()?;
        Ok(())
    }
}

impl LogBackend for Database {
    fn load_entries(&self) -> Result<Vec<LogEntry>> {
        let Some(raw) = self.kv_get(KEY_LOG_ENTRIES)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|source| {
            CoreError::Decoding(DecodingError {
                what: KEY_LOG_ENTRIES.into(),
                source,
            })
        })
    }

    fn save_entries(&mut self, entries: &[LogEntry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.kv_set(KEY_LOG_ENTRIES, &json)?;
        Ok(())
    }
}
