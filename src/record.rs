//! Student tracking record
//!
//! One record per student holding every completion fact the points are
//! derived from, plus a cached total. Categories absent from stored JSON
//! deserialize to empty maps, so call sites never check for missing keys.
//!
//! The merge methods report whether the call added a new fact. Only a new
//! fact earns points; re-marking something already completed is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackingError;

/// Lesson completion state for one topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    #[serde(default)]
    pub completed: bool,
}

/// Activities completed within one topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityProgress {
    #[serde(default)]
    pub completed_ids: BTreeSet<u32>,
}

/// Latest evaluation of one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationEntry {
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

/// Collaborative exercise completion for one topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaborativeProgress {
    #[serde(default)]
    pub discussion: bool,
    #[serde(default)]
    pub dialogue: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CollaborativeProgress {
    pub fn is_completed(&self, kind: CollaborativeKind) -> bool {
        match kind {
            CollaborativeKind::Discussion => self.discussion,
            CollaborativeKind::Dialogue => self.dialogue,
        }
    }

    /// Number of kinds marked complete (0..=2)
    pub fn completed_kinds(&self) -> usize {
        usize::from(self.discussion) + usize::from(self.dialogue)
    }
}

/// The two kinds of collaborative exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborativeKind {
    Discussion,
    Dialogue,
}

impl CollaborativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaborativeKind::Discussion => "discussion",
            CollaborativeKind::Dialogue => "dialogue",
        }
    }
}

impl fmt::Display for CollaborativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollaborativeKind {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discussion" => Ok(CollaborativeKind::Discussion),
            "dialogue" => Ok(CollaborativeKind::Dialogue),
            other => Err(TrackingError::InvalidInput(format!(
                "Unknown collaborative kind: {}. Valid kinds: discussion, dialogue",
                other
            ))),
        }
    }
}

/// Cached point total. Not a source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsCache {
    #[serde(default)]
    pub total: i64,
}

/// Everything tracked for one student
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTrackingRecord {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub lessons: BTreeMap<String, LessonProgress>,
    #[serde(default)]
    pub activities: BTreeMap<String, ActivityProgress>,
    #[serde(default)]
    pub evaluations: BTreeMap<String, EvaluationEntry>,
    #[serde(default)]
    pub collaborative: BTreeMap<String, CollaborativeProgress>,
    #[serde(default)]
    pub points: PointsCache,
}

impl StudentTrackingRecord {
    /// Empty record for a student with no activity yet
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            ..Default::default()
        }
    }

    /// Mark a lesson complete. Returns true if it was not complete before.
    pub fn mark_lesson_completed(&mut self, topic_id: &str) -> bool {
        let lesson = self.lessons.entry(topic_id.to_string()).or_default();
        if lesson.completed {
            return false;
        }
        lesson.completed = true;
        true
    }

    /// Add an activity id to a topic. Returns true if the id is new.
    pub fn add_completed_activity(&mut self, topic_id: &str, activity_id: u32) -> bool {
        self.activities
            .entry(topic_id.to_string())
            .or_default()
            .completed_ids
            .insert(activity_id)
    }

    /// Store an evaluation, replacing any earlier one for the topic.
    ///
    /// Returns true only for the topic's first evaluation; a resubmission
    /// updates the score but has already been counted.
    pub fn set_evaluation(&mut self, topic_id: &str, score: f64, at: DateTime<Utc>) -> bool {
        self.evaluations
            .insert(topic_id.to_string(), EvaluationEntry { score, timestamp: at })
            .is_none()
    }

    /// Mark one collaborative kind complete. Returns true if it was not complete before.
    pub fn mark_collaborative(&mut self, topic_id: &str, kind: CollaborativeKind, at: DateTime<Utc>) -> bool {
        let entry = self.collaborative.entry(topic_id.to_string()).or_default();
        if entry.is_completed(kind) {
            return false;
        }
        match kind {
            CollaborativeKind::Discussion => entry.discussion = true,
            CollaborativeKind::Dialogue => entry.dialogue = true,
        }
        entry.timestamp = Some(at);
        true
    }
}
