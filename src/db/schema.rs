//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::TrackingError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), TrackingError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, TrackingError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| TrackingError::Database(format!("Failed to create schema_version table: {}", e)))?;

    match conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(TrackingError::Database(format!("Failed to read schema_version: {}", e))),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), TrackingError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| TrackingError::Database(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| TrackingError::Database(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), TrackingError> {
    conn.execute_batch(TRACKING_SCHEMA)
        .map_err(|e| TrackingError::Database(format!("Failed to create tracking tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| TrackingError::Database(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), TrackingError> {
    info!(from_version, "No migration steps registered");
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// One row per student. The whole record lives in `record_json`;
/// `points_total` mirrors the cached total for ordering.
const TRACKING_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS student_tracking (
    student_id TEXT PRIMARY KEY NOT NULL,
    record_json TEXT NOT NULL,
    points_total INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_student_tracking_points ON student_tracking(points_total DESC);
"#;
