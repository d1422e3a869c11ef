//! Persistence seam for tracking records
//!
//! The recorder and reconciler only ever need three operations from storage:
//! a point lookup, a whole-record upsert, and a full scan. Keeping the seam
//! this narrow lets the hosted backend, SQLite, and the in-memory store used
//! by tests stand in for each other.
//!
//! The bulk reconciler scans with [`TrackingStore::list_totals`] instead of
//! `fetch_all`, so a record that no longer decodes fails only its own
//! student when `fetch_one` is called for it.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::TrackingError;
use crate::record::StudentTrackingRecord;

/// Storage for per-student tracking records
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Look up one student's record. `Ok(None)` if the student has none yet.
    async fn fetch_one(&self, student_id: &str) -> Result<Option<StudentTrackingRecord>, TrackingError>;

    /// Insert or replace the student's record as a whole
    async fn upsert(&self, student_id: &str, record: &StudentTrackingRecord) -> Result<(), TrackingError>;

    /// Every stored record
    async fn fetch_all(&self) -> Result<Vec<StudentTrackingRecord>, TrackingError>;

    /// Every stored student id with its cached total, ordered by id.
    ///
    /// Backends that keep records serialized should override this to skip
    /// decoding them.
    async fn list_totals(&self) -> Result<Vec<(String, i64)>, TrackingError> {
        let mut totals: Vec<_> = self
            .fetch_all()
            .await?
            .into_iter()
            .map(|record| (record.student_id, record.points.total))
            .collect();
        totals.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(totals)
    }
}
