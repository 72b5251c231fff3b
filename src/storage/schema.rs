//! Database schema definitions
//!
//! This module contains the SQL schema for the SQLite checkpoint backend.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One resume record per crawl target
CREATE TABLE IF NOT EXISTS checkpoints (
    target TEXT PRIMARY KEY,
    cursor TEXT,
    items_seen INTEGER NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
