//! Persistent side of the result cache: fingerprint -> serialized analysis.
//!
//! Rows are written on every cache put and read back in bulk at startup to
//! rehydrate the in-memory layer. Nothing here evicts; the in-memory LRU
//! owns the capacity bound.

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::AnalysisResult;

/// Insert or replace a cached analysis for a fingerprint.
pub fn upsert_cached_analysis(
    conn: &Connection,
    fingerprint: &str,
    result: &AnalysisResult,
) -> Result<(), DatabaseError> {
    let analysis = serde_json::to_string(result)
        .map_err(|e| DatabaseError::Corrupt(e.to_string()))?;
    conn.execute(
        "INSERT INTO analysis_cache (fingerprint, analysis, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(fingerprint) DO UPDATE SET
           analysis = excluded.analysis,
           created_at = excluded.created_at",
        params![fingerprint, analysis, result.timestamp.to_rfc3339()],
    )?;
    Ok(())
}

/// Look up a single cached analysis by fingerprint.
pub fn get_cached_analysis(
    conn: &Connection,
    fingerprint: &str,
) -> Result<Option<AnalysisResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT analysis FROM analysis_cache WHERE fingerprint = ?1 LIMIT 1",
    )?;
    let mut rows = stmt.query_map(params![fingerprint], |row| row.get::<_, String>(0))?;
    match rows.next() {
        Some(row) => {
            let json = row?;
            let result = serde_json::from_str(&json)
                .map_err(|e| DatabaseError::Corrupt(e.to_string()))?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

/// Load the most recent cached analyses, oldest first, up to `limit`.
///
/// Oldest-first ordering lets the caller feed an LRU so the newest rows end
/// up most recently used.
pub fn load_recent_cached(
    conn: &Connection,
    limit: usize,
) -> Result<Vec<(String, AnalysisResult)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT fingerprint, analysis FROM analysis_cache
         ORDER BY created_at DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (fingerprint, json) = row?;
        // A single undecodable row must not poison rehydration.
        match serde_json::from_str::<AnalysisResult>(&json) {
            Ok(result) => entries.push((fingerprint, result)),
            Err(e) => tracing::warn!(%fingerprint, error = %e, "Skipping corrupt cache row"),
        }
    }
    entries.reverse();
    Ok(entries)
}

/// Number of rows in the persistent cache.
pub fn cached_count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM analysis_cache", [], |row| row.get(0))?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Provenance, Severity};

    fn make_result(urgency: &str) -> AnalysisResult {
        AnalysisResult {
            severity: Severity::Moderate,
            possible_conditions: vec!["Common cold".into(), "Flu".into()],
            recommendations: vec!["Rest and stay hydrated".into()],
            urgency: urgency.into(),
            warning: None,
            additional_info: None,
            confidence: 0.7,
            source: Provenance::Remote,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let result = make_result("Monitor closely");
        upsert_cached_analysis(&conn, "fever en", &result).unwrap();

        let loaded = get_cached_analysis(&conn, "fever en").unwrap().unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn missing_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_cached_analysis(&conn, "absent").unwrap().is_none());
    }

    #[test]
    fn upsert_replaces_existing() {
        let conn = open_memory_database().unwrap();
        upsert_cached_analysis(&conn, "fp", &make_result("first")).unwrap();
        upsert_cached_analysis(&conn, "fp", &make_result("second")).unwrap();

        let loaded = get_cached_analysis(&conn, "fp").unwrap().unwrap();
        assert_eq!(loaded.urgency, "second");
        assert_eq!(cached_count(&conn).unwrap(), 1);
    }

    #[test]
    fn load_recent_respects_limit_and_order() {
        let conn = open_memory_database().unwrap();
        for i in 0..5 {
            let mut result = make_result(&format!("u{i}"));
            result.timestamp = Utc::now() + chrono::Duration::seconds(i);
            upsert_cached_analysis(&conn, &format!("fp{i}"), &result).unwrap();
        }

        let recent = load_recent_cached(&conn, 3).unwrap();
        assert_eq!(recent.len(), 3);
        // Oldest of the selected window first, newest last.
        assert_eq!(recent.first().unwrap().0, "fp2");
        assert_eq!(recent.last().unwrap().0, "fp4");
    }

    #[test]
    fn corrupt_row_skipped_on_rehydration() {
        let conn = open_memory_database().unwrap();
        upsert_cached_analysis(&conn, "good", &make_result("ok")).unwrap();
        conn.execute(
            "INSERT INTO analysis_cache (fingerprint, analysis, created_at)
             VALUES ('bad', 'not json', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let recent = load_recent_cached(&conn, 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].0, "good");
    }
}
