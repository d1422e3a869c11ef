//! Per-student write serialization
//!
//! The recorder's read-merge-write is not atomic against the store. Two calls
//! for the same student racing through it would both see a fact as new and
//! both bump the cached total. Holding the student's lock across the whole
//! sequence closes that window for writers inside this process. Writers in
//! other processes can still race; the reconciler corrects those.
//!
//! The reconciler rewrites whole records too and takes the same locks.
//!
//! Entries are created on first use and stay until [`StudentLocks::prune`]
//! drops the idle ones, so the table is bounded by the students seen since
//! the last prune.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per student id, created on first use
#[derive(Debug, Default)]
pub struct StudentLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl StudentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `student_id`'s record
    pub async fn acquire(&self, student_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the DashMap shard lock is released before awaiting
        let lock = self
            .locks
            .entry(student_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        // A holder or waiter owns a clone, so a count of 1 means idle
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of students currently in the table
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_same_student_is_exclusive() {
        let locks = StudentLocks::new();
        let guard = locks.acquire("s1").await;

        let blocked = timeout(Duration::from_millis(20), locks.acquire("s1")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = timeout(Duration::from_millis(100), locks.acquire("s1")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_students_independent() {
        let locks = StudentLocks::new();
        let _a = locks.acquire("a").await;
        let b = timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = StudentLocks::new();
        let held = locks.acquire("a").await;
        drop(locks.acquire("b").await);
        assert_eq!(locks.len(), 2);

        locks.prune();
        assert_eq!(locks.len(), 1);

        // Still exclusive after pruning
        let blocked = timeout(Duration::from_millis(20), locks.acquire("a")).await;
        assert!(blocked.is_err());
        drop(held);
        locks.prune();
        assert!(locks.is_empty());
    }
}
