//! Point value table
//!
//! Maps each activity category to the points a single completion is worth.
//! Values are fixed for the lifetime of the process; changing them
//! invalidates every cached total until a bulk reconcile runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Activity categories that earn points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Lesson,
    Activity,
    Evaluation,
    Collaborative,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 4] = [
        ActivityCategory::Lesson,
        ActivityCategory::Activity,
        ActivityCategory::Evaluation,
        ActivityCategory::Collaborative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::Lesson => "lesson",
            ActivityCategory::Activity => "activity",
            ActivityCategory::Evaluation => "evaluation",
            ActivityCategory::Collaborative => "collaborative",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points awarded per completion, by category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointValues {
    /// Per completed lesson
    #[serde(default = "default_lesson")]
    pub lesson: i64,
    /// Per completed activity id
    #[serde(default = "default_activity")]
    pub activity: i64,
    /// Per topic with an evaluation
    #[serde(default = "default_evaluation")]
    pub evaluation: i64,
    /// Per completed collaborative kind
    #[serde(default = "default_collaborative")]
    pub collaborative: i64,
}

fn default_lesson() -> i64 {
    PointValues::STANDARD.lesson
}

fn default_activity() -> i64 {
    PointValues::STANDARD.activity
}

fn default_evaluation() -> i64 {
    PointValues::STANDARD.evaluation
}

fn default_collaborative() -> i64 {
    PointValues::STANDARD.collaborative
}

impl PointValues {
    /// The standard table: lesson 20, everything else 10
    pub const STANDARD: PointValues = PointValues {
        lesson: 20,
        activity: 10,
        evaluation: 10,
        collaborative: 10,
    };

    /// Look up the value of one completion in `category`
    pub fn value_of(&self, category: ActivityCategory) -> i64 {
        match category {
            ActivityCategory::Lesson => self.lesson,
            ActivityCategory::Activity => self.activity,
            ActivityCategory::Evaluation => self.evaluation,
            ActivityCategory::Collaborative => self.collaborative,
        }
    }

    /// Reject negative values, which would break the non-negative total guarantee
    pub fn validate(&self) -> Result<(), crate::error::TrackingError> {
        for category in ActivityCategory::ALL {
            if self.value_of(category) < 0 {
                return Err(crate::error::TrackingError::Config(format!(
                    "Point value for {} must not be negative",
                    category
                )));
            }
        }
        Ok(())
    }
}

impl Default for PointValues {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_values() {
        let values = PointValues::default();
        assert_eq!(values.value_of(ActivityCategory::Lesson), 20);
        assert_eq!(values.value_of(ActivityCategory::Activity), 10);
        assert_eq!(values.value_of(ActivityCategory::Evaluation), 10);
        assert_eq!(values.value_of(ActivityCategory::Collaborative), 10);
    }

    #[test]
    fn test_partial_table_falls_back_to_standard() {
        let values: PointValues = toml::from_str("lesson = 25").unwrap();
        assert_eq!(values.lesson, 25);
        assert_eq!(values.activity, 10);
    }

    #[test]
    fn test_negative_value_rejected() {
        let values = PointValues { evaluation: -1, ..PointValues::STANDARD };
        assert!(values.validate().is_err());
        assert!(PointValues::STANDARD.validate().is_ok());
    }
}
