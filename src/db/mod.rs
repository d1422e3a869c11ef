//! SQLite storage for tracking records
//!
//! A single `student_tracking` table keyed by student id. The record is
//! stored as JSON, the same shape the hosted backend keeps in its JSON
//! column, so exports from one load into the other unchanged.

pub mod schema;
pub mod tracking;

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::TrackingError;
use crate::record::StudentTrackingRecord;
use crate::store::TrackingStore;

/// SQLite-backed tracking store
pub struct TrackingDb {
    conn: Mutex<Connection>,
}

impl TrackingDb {
    /// Open or create the tracking database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, TrackingError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| TrackingError::Database(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| TrackingError::Database(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, TrackingError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| TrackingError::Database(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), TrackingError> {
        self.with_conn(schema::init_schema)
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TrackingError>
    where
        F: FnOnce(&Connection) -> Result<T, TrackingError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| TrackingError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, TrackingError> {
        self.with_conn(|conn| {
            Ok(DbStats {
                student_count: tracking::tracking_count(conn)? as u64,
                cached_points_sum: tracking::cached_points_sum(conn)?,
            })
        })
    }
}

#[async_trait]
impl TrackingStore for TrackingDb {
    async fn fetch_one(&self, student_id: &str) -> Result<Option<StudentTrackingRecord>, TrackingError> {
        self.with_conn(|conn| tracking::get_tracking(conn, student_id))
    }

    async fn upsert(&self, student_id: &str, record: &StudentTrackingRecord) -> Result<(), TrackingError> {
        self.with_conn(|conn| tracking::upsert_tracking(conn, student_id, record))
    }

    async fn fetch_all(&self) -> Result<Vec<StudentTrackingRecord>, TrackingError> {
        self.with_conn(tracking::list_tracking)
    }

    async fn list_totals(&self) -> Result<Vec<(String, i64)>, TrackingError> {
        self.with_conn(tracking::list_tracking_totals)
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub student_count: u64,
    pub cached_points_sum: i64,
}
