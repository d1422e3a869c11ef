//! Tracking record CRUD operations

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::TrackingError;
use crate::record::StudentTrackingRecord;

fn parse_record(student_id: &str, json: &str) -> Result<StudentTrackingRecord, TrackingError> {
    let mut record: StudentTrackingRecord = serde_json::from_str(json)?;
    record.student_id = student_id.to_string();
    Ok(record)
}

/// Get a student's tracking record
pub fn get_tracking(conn: &Connection, student_id: &str) -> Result<Option<StudentTrackingRecord>, TrackingError> {
    let mut stmt = conn
        .prepare("SELECT record_json FROM student_tracking WHERE student_id = ?")
        .map_err(|e| TrackingError::Database(format!("Prepare failed: {}", e)))?;

    let mut rows = stmt
        .query(params![student_id])
        .map_err(|e| TrackingError::Database(format!("Query failed: {}", e)))?;

    if let Some(row) = rows.next().map_err(|e| TrackingError::Database(format!("Row fetch failed: {}", e)))? {
        let json: String = row
            .get(0)
            .map_err(|e| TrackingError::Database(format!("Row parse failed: {}", e)))?;
        Ok(Some(parse_record(student_id, &json)?))
    } else {
        Ok(None)
    }
}

/// Insert or replace a student's tracking record
pub fn upsert_tracking(
    conn: &Connection,
    student_id: &str,
    record: &StudentTrackingRecord,
) -> Result<(), TrackingError> {
    let mut stored = record.clone();
    stored.student_id = student_id.to_string();
    let json = serde_json::to_string(&stored)?;

    conn.execute(
        r#"
        INSERT INTO student_tracking (student_id, record_json, points_total)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(student_id) DO UPDATE SET
            record_json = excluded.record_json,
            points_total = excluded.points_total,
            updated_at = datetime('now')
        "#,
        params![student_id, json, stored.points.total],
    )
    .map_err(|e| TrackingError::Database(format!("Upsert failed: {}", e)))?;

    debug!(student_id = %student_id, total = stored.points.total, "Upserted tracking record");
    Ok(())
}

/// List every tracking record, ordered by student id
pub fn list_tracking(conn: &Connection) -> Result<Vec<StudentTrackingRecord>, TrackingError> {
    let mut stmt = conn
        .prepare("SELECT student_id, record_json FROM student_tracking ORDER BY student_id")
        .map_err(|e| TrackingError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| TrackingError::Database(format!("Query failed: {}", e)))?;

    let mut records = Vec::new();
    for row in rows {
        let (student_id, json) = row.map_err(|e| TrackingError::Database(format!("Row fetch failed: {}", e)))?;
        records.push(parse_record(&student_id, &json)?);
    }
    Ok(records)
}

/// List every student id with its cached total, ordered by student id.
///
/// Reads the `points_total` column only, so a row whose JSON no longer
/// parses still shows up here.
pub fn list_tracking_totals(conn: &Connection) -> Result<Vec<(String, i64)>, TrackingError> {
    let mut stmt = conn
        .prepare("SELECT student_id, points_total FROM student_tracking ORDER BY student_id")
        .map_err(|e| TrackingError::Database(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| TrackingError::Database(format!("Query failed: {}", e)))?;

    let mut totals = Vec::new();
    for row in rows {
        totals.push(row.map_err(|e| TrackingError::Database(format!("Row fetch failed: {}", e)))?);
    }
    Ok(totals)
}

/// Number of stored tracking records
pub fn tracking_count(conn: &Connection) -> Result<i64, TrackingError> {
    conn.query_row("SELECT COUNT(*) FROM student_tracking", [], |row| row.get(0))
        .map_err(|e| TrackingError::Database(format!("Count query failed: {}", e)))
}

/// Sum of cached totals across all students
pub fn cached_points_sum(conn: &Connection) -> Result<i64, TrackingError> {
    conn.query_row("SELECT COALESCE(SUM(points_total), 0) FROM student_tracking", [], |row| row.get(0))
        .map_err(|e| TrackingError::Database(format!("Sum query failed: {}", e)))
}
