//! Leaderboard standings
//!
//! Totals shown on the leaderboard always come from recomputation, never
//! from the cached field: either through the reconciler (which also repairs
//! the cache) or straight from freshly queried rows.

use serde::Serialize;
use tracing::warn;

use crate::calculator::{calculate_from_rows, RawActivityInput};
use crate::error::TrackingError;
use crate::points::PointValues;
use crate::reconciler::Reconciler;

/// One leaderboard line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    /// 1-based; tied totals share a rank
    pub rank: usize,
    pub student_id: String,
    pub total: i64,
}

/// Order by total descending then student id, assign shared ranks for ties,
/// and keep the first `limit` lines.
pub fn rank(mut totals: Vec<(String, i64)>, limit: Option<usize>) -> Vec<Standing> {
    totals.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut standings = Vec::with_capacity(totals.len());
    let mut previous: Option<i64> = None;
    let mut rank = 0;

    for (position, (student_id, total)) in totals.into_iter().enumerate() {
        if previous != Some(total) {
            rank = position + 1;
            previous = Some(total);
        }
        standings.push(Standing { rank, student_id, total });
    }

    if let Some(limit) = limit {
        standings.truncate(limit);
    }
    standings
}

/// Standings over every stored record, reconciling each on the way.
///
/// Students whose reconcile fails are left off the board.
pub async fn standings(reconciler: &Reconciler, limit: Option<usize>) -> Result<Vec<Standing>, TrackingError> {
    let report = reconciler.reconcile_all().await?;

    let totals = report
        .results
        .into_iter()
        .filter_map(|r| match (r.new_total, r.error) {
            (Some(total), None) => Some((r.student_id, total)),
            (_, error) => {
                warn!(student_id = %r.student_id, error = ?error, "Leaving student off leaderboard");
                None
            }
        })
        .collect();

    Ok(rank(totals, limit))
}

/// Standings computed from raw rows per student
pub fn standings_from_rows(
    students: &[(String, RawActivityInput)],
    values: &PointValues,
    limit: Option<usize>,
) -> Vec<Standing> {
    let totals = students
        .iter()
        .map(|(student_id, input)| {
            let calc = calculate_from_rows(input, values);
            if !calc.unmatched_titles.is_empty() {
                warn!(
                    student_id = %student_id,
                    unmatched = calc.unmatched_titles.len(),
                    "Submissions with unknown topic titles were not counted"
                );
            }
            (student_id.clone(), calc.breakdown.total)
        })
        .collect();

    rank(totals, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::ActivitySubmissionRow;

    #[test]
    fn test_rank_ties_share_position() {
        let standings = rank(
            vec![("c".into(), 10), ("a".into(), 40), ("b".into(), 40), ("d".into(), 0)],
            None,
        );
        let ranks: Vec<_> = standings.iter().map(|s| (s.rank, s.student_id.as_str())).collect();
        assert_eq!(ranks, vec![(1, "a"), (1, "b"), (3, "c"), (4, "d")]);
    }

    #[test]
    fn test_rank_limit() {
        let standings = rank(vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)], Some(2));
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].student_id, "c");
    }

    #[test]
    fn test_standings_from_rows() {
        let input = RawActivityInput {
            completed_lessons: vec!["t1".into()],
            activity_rows: vec![ActivitySubmissionRow { topic_id: "t1".into(), activity_id: 0 }],
            ..Default::default()
        };
        let students = vec![("s1".to_string(), input), ("s2".to_string(), RawActivityInput::default())];
        let standings = standings_from_rows(&students, &PointValues::default(), None);
        assert_eq!(standings[0], Standing { rank: 1, student_id: "s1".into(), total: 30 });
        assert_eq!(standings[1].total, 0);
    }
}
