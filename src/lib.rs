//! Katib Points - student points tracking and reconciliation
//!
//! Students of the Katib Arabic writing course earn points for finished
//! lessons, submitted activities, evaluated writing, and collaborative
//! discussion or dialogue exercises.
//!
//! ## Architecture
//!
//! ```text
//! UI completion events
//!     ↓
//! TrackingRecorder (read → merge → bump cached total → upsert)
//!     ↓
//! TrackingStore (hosted backend / SQLite / memory)
//!     ↑
//! Reconciler (recompute → correct cache)  ←  leaderboard, profile reads
//! ```
//!
//! ## Why a Reconciler?
//!
//! The recorder's cached `points.total` is a hint. Writes from other
//! processes, failed upserts, and point value changes all make it drift.
//! [`Reconciler::reconcile`] recomputes it from the record's facts and is the
//! only value shown to students.

pub mod calculator;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod locks;
pub mod points;
pub mod reconciler;
pub mod record;
pub mod recorder;
pub mod store;

// Re-exports
pub use calculator::{breakdown, calculate_from_rows, calculate_points, PointBreakdown, RawActivityInput};
pub use config::Config;
pub use db::TrackingDb;
pub use error::TrackingError;
pub use events::{EventBus, TrackingEvent};
pub use locks::StudentLocks;
pub use points::{ActivityCategory, PointValues};
pub use reconciler::{BulkReconcileReport, Reconciler, Reconciliation, StudentReconciliation};
pub use record::{CollaborativeKind, StudentTrackingRecord};
pub use recorder::{TrackOutcome, TrackingRecorder};
pub use store::{MemoryStore, TrackingStore};
