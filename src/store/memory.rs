//! In-memory tracking store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::TrackingStore;
use crate::error::TrackingError;
use crate::record::StudentTrackingRecord;

/// Tracking store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, StudentTrackingRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, keyed by each record's `student_id`
    pub fn with_records(records: impl IntoIterator<Item = StudentTrackingRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.student_id.clone(), r))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TrackingStore for MemoryStore {
    async fn fetch_one(&self, student_id: &str) -> Result<Option<StudentTrackingRecord>, TrackingError> {
        Ok(self.records.read().await.get(student_id).cloned())
    }

    async fn upsert(&self, student_id: &str, record: &StudentTrackingRecord) -> Result<(), TrackingError> {
        let mut stored = record.clone();
        stored.student_id = student_id.to_string();
        self.records.write().await.insert(student_id.to_string(), stored);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<StudentTrackingRecord>, TrackingError> {
        let mut all: Vec<_> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_and_keys_by_student() {
        let store = MemoryStore::new();
        assert!(store.fetch_one("s1").await.unwrap().is_none());

        let mut record = StudentTrackingRecord::new("wrong-id");
        record.mark_lesson_completed("t1");
        store.upsert("s1", &record).await.unwrap();

        let stored = store.fetch_one("s1").await.unwrap().unwrap();
        assert_eq!(stored.student_id, "s1");
        assert!(stored.lessons["t1"].completed);

        store.upsert("s1", &StudentTrackingRecord::new("s1")).await.unwrap();
        assert!(store.fetch_one("s1").await.unwrap().unwrap().lessons.is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_fetch_all_sorted() {
        let store = MemoryStore::with_records(vec![
            StudentTrackingRecord::new("b"),
            StudentTrackingRecord::new("a"),
        ]);
        let ids: Vec<_> = store.fetch_all().await.unwrap().into_iter().map(|r| r.student_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
