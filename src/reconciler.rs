//! Points reconciler
//!
//! The cached `points.total` drifts: recorder writes are not atomic, writes
//! can fail after the merge, and point values can change. The reconciler
//! recomputes the total from the record's facts and overwrites the cache
//! when they disagree. Any externally visible points read goes through here.
//!
//! A reconcile is itself a read-modify-write of the whole record. Give it
//! the recorder's [`StudentLocks`] so a completion committed between its
//! read and its write is not overwritten by the stale snapshot.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::calculator::calculate_points;
use crate::error::TrackingError;
use crate::events::{EventBus, TrackingEvent};
use crate::locks::StudentLocks;
use crate::points::PointValues;
use crate::store::TrackingStore;

/// Result of reconciling one student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Cached total before the pass (0 if the student had no record)
    pub old_total: i64,
    /// Recomputed total, now stored
    pub new_total: i64,
    /// Whether a corrective write was made
    pub corrected: bool,
}

/// One line of a bulk report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentReconciliation {
    pub student_id: String,
    pub old_total: i64,
    pub new_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a bulk reconcile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkReconcileReport {
    pub successes: usize,
    pub errors: usize,
    pub results: Vec<StudentReconciliation>,
}

impl BulkReconcileReport {
    /// Students whose cached total was changed
    pub fn corrected(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.error.is_none() && r.new_total != Some(r.old_total))
            .count()
    }
}

/// Recomputes and repairs cached point totals
pub struct Reconciler {
    store: Arc<dyn TrackingStore>,
    values: PointValues,
    locks: Option<Arc<StudentLocks>>,
    events: Option<Arc<EventBus>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn TrackingStore>, values: PointValues) -> Self {
        Self {
            store,
            values,
            locks: None,
            events: None,
        }
    }

    /// Serialize against recorders sharing the same lock table
    pub fn with_locks(mut self, locks: Arc<StudentLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn point_values(&self) -> &PointValues {
        &self.values
    }

    /// Reconcile one student and return the authoritative total.
    ///
    /// Writes only when the cached value differs, so a second call with no
    /// intervening activity is a read-only no-op returning the same total.
    pub async fn reconcile(&self, student_id: &str) -> Result<Reconciliation, TrackingError> {
        // Held until the corrective write completes
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(student_id).await),
            None => None,
        };

        let Some(mut record) = self.store.fetch_one(student_id).await? else {
            debug!(student_id = %student_id, "No tracking record, total is 0");
            return Ok(Reconciliation {
                old_total: 0,
                new_total: 0,
                corrected: false,
            });
        };

        let old_total = record.points.total;
        let new_total = calculate_points(Some(&record), &self.values);

        if old_total == new_total {
            return Ok(Reconciliation {
                old_total,
                new_total,
                corrected: false,
            });
        }

        record.points.total = new_total;
        self.store.upsert(student_id, &record).await?;

        info!(student_id = %student_id, old_total, new_total, "Corrected cached points total");
        self.emit(TrackingEvent::PointsReconciled {
            student_id: student_id.to_string(),
            old_total,
            new_total,
        });

        Ok(Reconciliation {
            old_total,
            new_total,
            corrected: true,
        })
    }

    /// Authoritative total for display. Falls back to 0 on error, after logging.
    pub async fn current_points(&self, student_id: &str) -> i64 {
        match self.reconcile(student_id).await {
            Ok(r) => r.new_total,
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "Failed to reconcile points for display");
                0
            }
        }
    }

    /// Reconcile every stored record.
    ///
    /// Each student is an isolated failure domain: an error, including a
    /// stored record that no longer decodes, is recorded in the report and
    /// the scan moves on. Only a failure of the initial id scan is returned
    /// as `Err`.
    pub async fn reconcile_all(&self) -> Result<BulkReconcileReport, TrackingError> {
        let students = self.store.list_totals().await?;
        info!(count = students.len(), "Starting bulk reconcile");

        let mut report = BulkReconcileReport::default();

        for (student_id, scanned_total) in students {

            match self.reconcile(&student_id).await {
                Ok(r) => {
                    report.successes += 1;
                    report.results.push(StudentReconciliation {
                        student_id,
                        old_total: r.old_total,
                        new_total: Some(r.new_total),
                        error: None,
                    });
                }
                Err(e) => {
                    error!(student_id = %student_id, error = %e, "Reconcile failed");
                    report.errors += 1;
                    report.results.push(StudentReconciliation {
                        student_id,
                        old_total: scanned_total,
                        new_total: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if let Some(locks) = &self.locks {
            locks.prune();
        }

        let corrected = report.corrected();
        info!(
            successes = report.successes,
            errors = report.errors,
            corrected,
            "Bulk reconcile finished"
        );
        self.emit(TrackingEvent::BulkReconcileFinished {
            successes: report.successes,
            errors: report.errors,
            corrected,
        });

        Ok(report)
    }

    fn emit(&self, event: TrackingEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}
