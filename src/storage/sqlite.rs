//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore
//! trait. The connection sits behind a mutex so all workers share one store.

use crate::state::{CrawlTarget, Cursor};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::CheckpointRecord;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// File name of the database inside the state directory
pub const DATABASE_FILE: &str = "checkpoints.db";

/// SQLite checkpoint backend
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

type RawRow = (Value, Value, Value);

/// Converts raw column values into a record, rejecting anything out of shape
fn decode_row(key: &str, (cursor, items_seen, completed): RawRow) -> StorageResult<CheckpointRecord> {
    let corrupt = |reason: String| StorageError::Corrupt {
        key: key.to_string(),
        reason,
    };

    let cursor = match cursor {
        Value::Null => None,
        Value::Text(text) => Some(Cursor::new(text)),
        Value::Integer(n) => Some(Cursor::new(n.to_string())),
        other => return Err(corrupt(format!("cursor has unexpected type {:?}", other))),
    };

    let items_seen = match items_seen {
        Value::Integer(n) if n >= 0 => n as u64,
        other => return Err(corrupt(format!("items_seen is invalid: {:?}", other))),
    };

    let completed = match completed {
        Value::Integer(0) => false,
        Value::Integer(1) => true,
        other => return Err(corrupt(format!("completed is invalid: {:?}", other))),
    };

    Ok(CheckpointRecord {
        cursor,
        items_seen,
        completed,
    })
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load(&self, target: &CrawlTarget) -> StorageResult<Option<CheckpointRecord>> {
        let key = target.key();
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;

        let raw = conn
            .query_row(
                "SELECT cursor, items_seen, completed FROM checkpoints WHERE target = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        raw.map(|raw| decode_row(&key, raw)).transpose()
    }

    fn save(&self, target: &CrawlTarget, record: &CheckpointRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;

        conn.execute(
            "INSERT INTO checkpoints (target, cursor, items_seen, completed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(target) DO UPDATE SET
                cursor = excluded.cursor,
                items_seen = excluded.items_seen,
                completed = excluded.completed,
                updated_at = excluded.updated_at",
            params![
                target.key(),
                record.cursor.as_ref().map(|c| c.as_str()),
                record.items_seen as i64,
                record.completed,
                now
            ],
        )?;

        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<(String, StorageResult<CheckpointRecord>)>> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT target, cursor, items_seen, completed FROM checkpoints ORDER BY target",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                (row.get(1)?, row.get(2)?, row.get(3)?),
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            let record = decode_row(&key, raw);
            entries.push((key, record));
        }

        Ok(entries)
    }
}
