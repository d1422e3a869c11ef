//! Point calculator
//!
//! Derives a student's total from completion facts alone. The cached
//! `points.total` on a record is never read here.
//!
//! Two entry points:
//! - [`calculate_points`] over a [`StudentTrackingRecord`]
//! - [`calculate_from_rows`] over raw rows as queried for leaderboards
//!
//! The row form folds its rows into a record and runs the same counting,
//! so both agree whenever they describe the same facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::points::{ActivityCategory, PointValues};
use crate::record::{CollaborativeKind, StudentTrackingRecord};

/// Per-category counts and the resulting total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointBreakdown {
    pub completed_lessons: usize,
    pub completed_activities: usize,
    pub evaluated_topics: usize,
    pub collaborative_kinds: usize,
    pub total: i64,
}

impl PointBreakdown {
    fn from_counts(
        completed_lessons: usize,
        completed_activities: usize,
        evaluated_topics: usize,
        collaborative_kinds: usize,
        values: &PointValues,
    ) -> Self {
        let total = completed_lessons as i64 * values.value_of(ActivityCategory::Lesson)
            + completed_activities as i64 * values.value_of(ActivityCategory::Activity)
            + evaluated_topics as i64 * values.value_of(ActivityCategory::Evaluation)
            + collaborative_kinds as i64 * values.value_of(ActivityCategory::Collaborative);

        Self {
            completed_lessons,
            completed_activities,
            evaluated_topics,
            collaborative_kinds,
            total,
        }
    }
}

/// Count every category of `record`. An absent record counts as empty.
pub fn breakdown(record: Option<&StudentTrackingRecord>, values: &PointValues) -> PointBreakdown {
    let Some(record) = record else {
        return PointBreakdown::default();
    };

    let completed_lessons = record.lessons.values().filter(|l| l.completed).count();

    let completed_activities = record
        .activities
        .values()
        .map(|a| a.completed_ids.len())
        .sum();

    // Any evaluation counts, whatever its score
    let evaluated_topics = record.evaluations.len();

    let collaborative_kinds = record
        .collaborative
        .values()
        .map(|c| c.completed_kinds())
        .sum();

    PointBreakdown::from_counts(
        completed_lessons,
        completed_activities,
        evaluated_topics,
        collaborative_kinds,
        values,
    )
}

/// Total points for `record`
pub fn calculate_points(record: Option<&StudentTrackingRecord>, values: &PointValues) -> i64 {
    breakdown(record, values).total
}

// ============================================================================
// Raw row input
// ============================================================================

/// One submitted activity, as stored in the activity submissions table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivitySubmissionRow {
    pub topic_id: String,
    pub activity_id: u32,
}

/// One collaborative completion row
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollaborativeCompletionRow {
    pub topic_id: String,
    pub kind: CollaborativeKind,
    pub completed_at: DateTime<Utc>,
}

/// A free-text submission that was evaluated.
///
/// Older submissions carry only the topic title; those are matched against
/// the topic catalog.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluatedSubmissionRow {
    #[serde(default)]
    pub topic_id: Option<String>,
    pub topic_title: String,
    #[serde(default)]
    pub score: Option<f64>,
    pub submitted_at: DateTime<Utc>,
}

/// A known topic
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopicCatalogEntry {
    pub id: String,
    pub title: String,
}

/// Raw rows describing one student's completions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawActivityInput {
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    #[serde(default)]
    pub activity_rows: Vec<ActivitySubmissionRow>,
    #[serde(default)]
    pub collaborative_rows: Vec<CollaborativeCompletionRow>,
    #[serde(default)]
    pub submissions: Vec<EvaluatedSubmissionRow>,
    #[serde(default)]
    pub catalog: Vec<TopicCatalogEntry>,
}

/// Result of a row-based calculation
#[derive(Debug, Clone, Serialize)]
pub struct RawCalculation {
    pub breakdown: PointBreakdown,
    /// Titles of submissions that matched no catalog topic and were not counted
    pub unmatched_titles: Vec<String>,
}

fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl RawActivityInput {
    /// Fold the rows into a tracking record for `student_id`.
    ///
    /// Returns the record and the titles that could not be resolved to a topic.
    pub fn to_record(&self, student_id: &str) -> (StudentTrackingRecord, Vec<String>) {
        let mut record = StudentTrackingRecord::new(student_id);

        for topic_id in &self.completed_lessons {
            record.mark_lesson_completed(topic_id);
        }

        for row in &self.activity_rows {
            record.add_completed_activity(&row.topic_id, row.activity_id);
        }

        for row in &self.collaborative_rows {
            record.mark_collaborative(&row.topic_id, row.kind, row.completed_at);
        }

        let by_title: HashMap<String, &str> = self
            .catalog
            .iter()
            .map(|t| (normalize_title(&t.title), t.id.as_str()))
            .collect();

        let mut unmatched = Vec::new();
        for row in &self.submissions {
            let topic_id = match &row.topic_id {
                Some(id) => Some(id.as_str()),
                None => by_title.get(&normalize_title(&row.topic_title)).copied(),
            };
            match topic_id {
                Some(topic_id) => {
                    record.set_evaluation(topic_id, row.score.unwrap_or(0.0), row.submitted_at);
                }
                None => unmatched.push(row.topic_title.clone()),
            }
        }

        (record, unmatched)
    }
}

/// Compute points from raw rows
pub fn calculate_from_rows(input: &RawActivityInput, values: &PointValues) -> RawCalculation {
    let (record, unmatched_titles) = input.to_record("");
    RawCalculation {
        breakdown: breakdown(Some(&record), values),
        unmatched_titles,
    }
}
