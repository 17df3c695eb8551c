//! Database schema migrations for checkpoint.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use tracing::{info, warn};

use super::database::KEY_LOG_ENTRIES;
use crate::log::LogEntry;

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "Failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: key-value table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: fold a legacy `work_logs` table into `log_entries`.
///
/// Older builds kept entries in
/// `work_logs(id INTEGER PRIMARY KEY, timestamp TEXT, project TEXT, description TEXT)`.
/// Rows get fresh UUIDs; rows with blank fields or unparseable timestamps
/// are skipped. The legacy table is dropped afterwards.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    let has_legacy: bool = tx
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'work_logs'",
            [],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if has_legacy {
        let mut legacy = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT timestamp, project, description FROM work_logs ORDER BY timestamp DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;
            for row in rows {
                let (timestamp, project, description) = row?;
                match legacy_entry(timestamp, project, description) {
                    Some(entry) => legacy.push(entry),
                    None => warn!("Skipping unreadable legacy work_logs row"),
                }
            }
        }

        let mut entries: Vec<LogEntry> = tx
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![KEY_LOG_ENTRIES],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        let imported = legacy.len();
        entries.extend(legacy);
        entries.sort_by(|a, b| b.date.cmp(&a.date));

        let json = serde_json::to_string(&entries)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![KEY_LOG_ENTRIES, json],
        )?;
        tx.execute_batch("DROP TABLE work_logs;")?;
        info!(imported, "Imported legacy work_logs rows");
    }

    set_schema_version(&tx, 2)?;
    tx.commit()
}

fn legacy_entry(
    timestamp: Option<String>,
    project: Option<String>,
    description: Option<String>,
) -> Option<LogEntry> {
    let date = parse_legacy_timestamp(timestamp.as_deref()?)?;
    LogEntry::with_date(project.as_deref()?, description.as_deref()?, date, None).ok()
}

fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        // Idempotent.
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn legacy_work_logs_are_imported() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE work_logs (
                id INTEGER PRIMARY KEY,
                timestamp TEXT,
                project TEXT,
                description TEXT
            );
            INSERT INTO work_logs (timestamp, project, description)
                VALUES ('2025-09-01 09:00:00', 'Checkpoint', 'Menu bar');
            INSERT INTO work_logs (timestamp, project, description)
                VALUES ('2025-09-02T10:30:00+00:00', 'Checkpoint', 'SQLite layer');
            INSERT INTO work_logs (timestamp, project, description)
                VALUES ('yesterday', 'Broken', 'row');
            INSERT INTO work_logs (timestamp, project, description)
                VALUES ('2025-09-03 09:00:00', '  ', 'blank project');",
        )
        .unwrap();

        migrate(&conn).unwrap();

        let raw: String = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![KEY_LOG_ENTRIES],
                |row| row.get(0),
            )
            .unwrap();
        let entries: Vec<LogEntry> = serde_json::from_str(&raw).unwrap();
        let descriptions: Vec<&str> = entries.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(descriptions, vec!["SQLite layer", "Menu bar"]);

        let legacy_left: Option<i32> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'work_logs'",
                [],
                |row| row.get(0),
            )
            .optional()
            .unwrap();
        assert!(legacy_left.is_none());
    }

    #[test]
    fn legacy_timestamp_formats() {
        assert!(parse_legacy_timestamp("2025-09-01 09:00:00").is_some());
        assert!(parse_legacy_timestamp("2025-09-01T09:00:00Z").is_some());
        assert!(parse_legacy_timestamp("09/01/2025").is_none());
    }
}
