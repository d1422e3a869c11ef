//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use katib_points::{MemoryStore, StudentTrackingRecord, TrackingError, TrackingStore};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Wraps a MemoryStore with injectable per-student failures and read latency
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_reads_for: HashSet<String>,
    fail_writes_for: HashSet<String>,
    read_delay: Option<Duration>,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn failing_reads(mut self, student_id: &str) -> Self {
        self.fail_reads_for.insert(student_id.to_string());
        self
    }

    pub fn failing_writes(mut self, student_id: &str) -> Self {
        self.fail_writes_for.insert(student_id.to_string());
        self
    }

    /// Sleep after taking the read snapshot, widening the read-merge-write window
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrackingStore for FlakyStore {
    async fn fetch_one(&self, student_id: &str) -> Result<Option<StudentTrackingRecord>, TrackingError> {
        if self.fail_reads_for.contains(student_id) {
            return Err(TrackingError::Database(format!("read refused for {}", student_id)));
        }
        let snapshot = self.inner.fetch_one(student_id).await?;
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn upsert(&self, student_id: &str, record: &StudentTrackingRecord) -> Result<(), TrackingError> {
        if self.fail_writes_for.contains(student_id) {
            return Err(TrackingError::Database(format!("write refused for {}", student_id)));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(student_id, record).await
    }

    async fn fetch_all(&self) -> Result<Vec<StudentTrackingRecord>, TrackingError> {
        self.inner.fetch_all().await
    }
}

/// A record with one finished lesson and activities 0 and 1 on topic t1
/// (worth 40), carrying an arbitrary cached total
pub fn record_worth_40(student_id: &str, cached: i64) -> StudentTrackingRecord {
    let mut record = StudentTrackingRecord::new(student_id);
    record.mark_lesson_completed("t1");
    record.add_completed_activity("t1", 0);
    record.add_completed_activity("t1", 1);
    record.points.total = cached;
    record
}
