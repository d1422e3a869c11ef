//! Tracking recorder
//!
//! One operation per activity category. Each reads the student's record,
//! merges the completion fact, bumps the cached total if the fact is new,
//! and writes the whole record back.
//!
//! Tracking is a side effect of a user action (submitting an activity,
//! finishing a lesson) and must never fail that action. Every error is
//! logged and reported as [`TrackOutcome::Failed`]; nothing is returned as
//! `Err` and nothing is retried. A failed read aborts before any write.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::TrackingError;
use crate::events::{EventBus, TrackingEvent};
use crate::locks::StudentLocks;
use crate::points::{ActivityCategory, PointValues};
use crate::record::{CollaborativeKind, StudentTrackingRecord};
use crate::store::TrackingStore;

/// What a recorder call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// New fact recorded and `points` added to the cached total
    Awarded { points: i64, cached_total: i64 },
    /// Fact was already present; record written, cached total unchanged
    AlreadyCounted,
    /// Read, validation, or write failed; see logs
    Failed,
}

impl TrackOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, TrackOutcome::Failed)
    }

    /// Points this call added to the cached total
    pub fn points_awarded(&self) -> i64 {
        match self {
            TrackOutcome::Awarded { points, .. } => *points,
            _ => 0,
        }
    }
}

/// Records completion events into tracking records
pub struct TrackingRecorder {
    store: Arc<dyn TrackingStore>,
    values: PointValues,
    locks: Option<Arc<StudentLocks>>,
    events: Option<Arc<EventBus>>,
}

impl TrackingRecorder {
    /// Create a recorder that serializes writes per student
    pub fn new(store: Arc<dyn TrackingStore>, values: PointValues) -> Self {
        Self {
            store,
            values,
            locks: Some(Arc::new(StudentLocks::new())),
            events: None,
        }
    }

    /// Share a lock table with other recorders in the same process
    pub fn with_locks(mut self, locks: Arc<StudentLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Run read-merge-write without per-student locking.
    ///
    /// Concurrent calls for one student may then lose each other's facts
    /// or leave the cached total wrong; only the reconciler corrects the total.
    pub fn without_write_serialization(mut self) -> Self {
        self.locks = None;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn point_values(&self) -> &PointValues {
        &self.values
    }

    // =========================================================================
    // Category operations
    // =========================================================================

    /// Student finished reading a lesson
    pub async fn track_lesson_completion(&self, student_id: &str, topic_id: &str) -> TrackOutcome {
        self.record(student_id, topic_id, ActivityCategory::Lesson, |record| {
            Ok(record.mark_lesson_completed(topic_id))
        })
        .await
    }

    /// Student submitted interactive activity `activity_id` within a topic
    pub async fn track_activity_submission(&self, student_id: &str, topic_id: &str, activity_id: u32) -> TrackOutcome {
        self.record(student_id, topic_id, ActivityCategory::Activity, |record| {
            Ok(record.add_completed_activity(topic_id, activity_id))
        })
        .await
    }

    /// A submission for a topic was evaluated. Resubmissions replace the score
    /// but earn nothing further.
    pub async fn track_evaluation(&self, student_id: &str, topic_id: &str, score: f64) -> TrackOutcome {
        self.record(student_id, topic_id, ActivityCategory::Evaluation, |record| {
            if !score.is_finite() {
                return Err(TrackingError::InvalidInput(format!("Score must be finite, got {}", score)));
            }
            Ok(record.set_evaluation(topic_id, score, Utc::now()))
        })
        .await
    }

    /// Student completed the discussion or dialogue exercise of a topic
    pub async fn track_collaborative_completion(
        &self,
        student_id: &str,
        topic_id: &str,
        kind: CollaborativeKind,
    ) -> TrackOutcome {
        self.record(student_id, topic_id, ActivityCategory::Collaborative, |record| {
            Ok(record.mark_collaborative(topic_id, kind, Utc::now()))
        })
        .await
    }

    // =========================================================================
    // Read-merge-write
    // =========================================================================

    async fn record<F>(&self, student_id: &str, topic_id: &str, category: ActivityCategory, merge: F) -> TrackOutcome
    where
        F: FnOnce(&mut StudentTrackingRecord) -> Result<bool, TrackingError> + Send,
    {
        match self.try_record(student_id, topic_id, category, merge).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    student_id = %student_id,
                    topic_id = %topic_id,
                    category = %category,
                    error = %e,
                    "Tracking update dropped"
                );
                self.emit(TrackingEvent::TrackingFailed {
                    student_id: student_id.to_string(),
                    category,
                    reason: e.to_string(),
                });
                TrackOutcome::Failed
            }
        }
    }

    async fn try_record<F>(
        &self,
        student_id: &str,
        topic_id: &str,
        category: ActivityCategory,
        merge: F,
    ) -> Result<TrackOutcome, TrackingError>
    where
        F: FnOnce(&mut StudentTrackingRecord) -> Result<bool, TrackingError> + Send,
    {
        if student_id.trim().is_empty() {
            return Err(TrackingError::InvalidInput("student_id is required".into()));
        }
        if topic_id.trim().is_empty() {
            return Err(TrackingError::InvalidInput("topic_id is required".into()));
        }

        // Held until the write completes
        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(student_id).await),
            None => None,
        };

        let mut record = match self.store.fetch_one(student_id).await {
            Ok(Some(record)) => record,
            Ok(None) => StudentTrackingRecord::new(student_id),
            Err(e) => {
                warn!(student_id = %student_id, error = %e, "Failed to read tracking record, skipping update");
                return Err(e);
            }
        };

        let first_completion = merge(&mut record)?;

        let points = if first_completion {
            let points = self.values.value_of(category);
            record.points.total = record.points.total.saturating_add(points);
            points
        } else {
            0
        };

        if let Err(e) = self.store.upsert(student_id, &record).await {
            warn!(student_id = %student_id, error = %e, "Failed to write tracking record");
            return Err(e);
        }

        if first_completion {
            info!(
                student_id = %student_id,
                topic_id = %topic_id,
                category = %category,
                points,
                cached_total = record.points.total,
                "Points awarded"
            );
            self.emit(TrackingEvent::PointsAwarded {
                student_id: student_id.to_string(),
                topic_id: topic_id.to_string(),
                category,
                points,
                cached_total: record.points.total,
            });
            Ok(TrackOutcome::Awarded {
                points,
                cached_total: record.points.total,
            })
        } else {
            debug!(student_id = %student_id, topic_id = %topic_id, category = %category, "Already counted");
            self.emit(TrackingEvent::AlreadyCounted {
                student_id: student_id.to_string(),
                topic_id: topic_id.to_string(),
                category,
            });
            Ok(TrackOutcome::AlreadyCounted)
        }
    }

    fn emit(&self, event: TrackingEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_points;
    use crate::store::MemoryStore;

    fn recorder() -> (TrackingRecorder, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (TrackingRecorder::new(store.clone(), PointValues::default()), store)
    }

    async fn cached_total(store: &MemoryStore, student_id: &str) -> i64 {
        store.fetch_one(student_id).await.unwrap().unwrap().points.total
    }

    #[tokio::test]
    async fn test_first_lesson_creates_record() {
        let (recorder, store) = recorder();
        let outcome = recorder.track_lesson_completion("s1", "t1").await;
        assert_eq!(outcome, TrackOutcome::Awarded { points: 20, cached_total: 20 });
        assert_eq!(cached_total(&store, "s1").await, 20);
    }

    #[tokio::test]
    async fn test_huge_cached_total_saturates() {
        let mut record = StudentTrackingRecord::new("s1");
        record.points.total = i64::MAX - 5;
        let store = Arc::new(MemoryStore::with_records(vec![record]));
        let recorder = TrackingRecorder::new(store.clone(), PointValues::default());

        let outcome = recorder.track_lesson_completion("s1", "t1").await;
        assert_eq!(outcome, TrackOutcome::Awarded { points: 20, cached_total: i64::MAX });
        assert_eq!(cached_total(&store, "s1").await, i64::MAX);
    }

    #[tokio::test]
    async fn test_activity_counted_once() {
        let (recorder, store) = recorder();
        assert_eq!(recorder.track_activity_submission("s1", "t1", 0).await.points_awarded(), 10);
        assert_eq!(recorder.track_activity_submission("s1", "t1", 0).await, TrackOutcome::AlreadyCounted);

        let record = store.fetch_one("s1").await.unwrap().unwrap();
        assert_eq!(record.activities["t1"].completed_ids.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(record.points.total, 10);
    }

    #[tokio::test]
    async fn test_evaluation_resubmission_keeps_points() {
        let (recorder, store) = recorder();
        assert_eq!(recorder.track_evaluation("s1", "t1", 5.0).await.points_awarded(), 10);
        assert_eq!(recorder.track_evaluation("s1", "t1", 9.5).await, TrackOutcome::AlreadyCounted);

        let record = store.fetch_one("s1").await.unwrap().unwrap();
        assert_eq!(record.evaluations["t1"].score, 9.5);
        assert_eq!(record.points.total, 10);
    }

    #[tokio::test]
    async fn test_collaborative_kinds_each_award() {
        let (recorder, store) = recorder();
        let first = recorder.track_collaborative_completion("s1", "t1", CollaborativeKind::Discussion).await;
        let second = recorder.track_collaborative_completion("s1", "t1", CollaborativeKind::Dialogue).await;
        assert_eq!(first.points_awarded() + second.points_awarded(), 20);

        let record = store.fetch_one("s1").await.unwrap().unwrap();
        assert!(record.collaborative["t1"].discussion);
        assert!(record.collaborative["t1"].dialogue);
        assert_eq!(record.points.total, 20);
    }

    #[tokio::test]
    async fn test_invalid_input_fails_without_write() {
        let (recorder, store) = recorder();
        assert!(recorder.track_lesson_completion("", "t1").await.is_failed());
        assert!(recorder.track_evaluation("s1", "t1", f64::NAN).await.is_failed());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_matches_calculator_after_sequential_calls() {
        let (recorder, store) = recorder();
        recorder.track_lesson_completion("s1", "t1").await;
        recorder.track_activity_submission("s1", "t1", 0).await;
        recorder.track_activity_submission("s1", "t1", 1).await;
        recorder.track_evaluation("s1", "t1", 7.0).await;
        recorder.track_collaborative_completion("s1", "t1", CollaborativeKind::Dialogue).await;

        let record = store.fetch_one("s1").await.unwrap().unwrap();
        assert_eq!(record.points.total, calculate_points(Some(&record), recorder.point_values()));
        assert_eq!(record.points.total, 60);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let (recorder, _store) = recorder();
        let events = Arc::new(EventBus::new());
        let recorder = recorder.with_events(events.clone());
        let mut rx = events.subscribe();

        recorder.track_lesson_completion("s1", "t1").await;
        recorder.track_lesson_completion("s1", "t1").await;

        assert!(matches!(rx.recv().await.unwrap(), TrackingEvent::PointsAwarded { points: 20, .. }));
        assert!(matches!(rx.recv().await.unwrap(), TrackingEvent::AlreadyCounted { .. }));
    }
}
