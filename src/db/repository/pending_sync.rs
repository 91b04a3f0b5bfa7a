//! Persistent side of the offline durable queue.
//!
//! Each row is an analysis that has not yet been confirmed by the durable
//! archive. Rows are append-only and deleted individually after a confirmed
//! archive write, so a crash mid-drain leaves the remainder intact.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::AnalysisResult;

/// An analysis awaiting a durable-archive write.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSyncItem {
    pub id: Uuid,
    pub symptoms: String,
    pub language: String,
    pub analysis: AnalysisResult,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
}

impl PendingSyncItem {
    pub fn new(symptoms: &str, language: &str, analysis: AnalysisResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            symptoms: symptoms.to_string(),
            language: language.to_string(),
            analysis,
            synced: false,
            created_at: Utc::now(),
        }
    }
}

/// Append an item to the queue.
pub fn insert_pending(conn: &Connection, item: &PendingSyncItem) -> Result<(), DatabaseError> {
    let analysis = serde_json::to_string(&item.analysis)
        .map_err(|e| DatabaseError::Corrupt(e.to_string()))?;
    conn.execute(
        "INSERT INTO pending_sync (id, symptoms, language, analysis, synced, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.id.to_string(),
            item.symptoms,
            item.language,
            analysis,
            item.synced as i64,
            item.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// All unsynced items, oldest first.
pub fn get_unsynced(conn: &Connection) -> Result<Vec<PendingSyncItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, symptoms, language, analysis, synced, created_at
         FROM pending_sync
         WHERE synced = 0
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut items = Vec::new();
    for row in rows {
        let (id, symptoms, language, analysis, synced, created_at) = row?;
        items.push(PendingSyncItem {
            id: Uuid::parse_str(&id).map_err(|e| DatabaseError::Corrupt(e.to_string()))?,
            symptoms,
            language,
            analysis: serde_json::from_str(&analysis)
                .map_err(|e| DatabaseError::Corrupt(e.to_string()))?,
            synced: synced != 0,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| DatabaseError::Corrupt(e.to_string()))?
                .with_timezone(&Utc),
        });
    }
    Ok(items)
}

/// Remove an item after its archive write is confirmed.
pub fn delete_pending(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM pending_sync WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(())
}

/// Number of items still awaiting sync.
pub fn unsynced_count(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pending_sync WHERE synced = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Provenance, Severity};

    fn make_item(symptoms: &str) -> PendingSyncItem {
        PendingSyncItem::new(
            symptoms,
            "en",
            AnalysisResult {
                severity: Severity::High,
                possible_conditions: vec!["Severe infection".into()],
                recommendations: vec!["Seek medical attention".into()],
                urgency: "Seek medical care within 2-4 hours".into(),
                warning: Some("High fever can indicate serious infection".into()),
                additional_info: None,
                confidence: 0.8,
                source: Provenance::Remote,
                timestamp: Utc::now(),
            },
        )
    }

    #[test]
    fn insert_and_read_back() {
        let conn = open_memory_database().unwrap();
        let item = make_item("high fever for two days");
        insert_pending(&conn, &item).unwrap();

        let items = get_unsynced(&conn).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], item);
    }

    #[test]
    fn items_ordered_oldest_first() {
        let conn = open_memory_database().unwrap();
        let mut first = make_item("first");
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let second = make_item("second");
        insert_pending(&conn, &second).unwrap();
        insert_pending(&conn, &first).unwrap();

        let items = get_unsynced(&conn).unwrap();
        assert_eq!(items[0].symptoms, "first");
        assert_eq!(items[1].symptoms, "second");
    }

    #[test]
    fn delete_removes_single_item() {
        let conn = open_memory_database().unwrap();
        let a = make_item("a");
        let b = make_item("b");
        insert_pending(&conn, &a).unwrap();
        insert_pending(&conn, &b).unwrap();

        delete_pending(&conn, &a.id).unwrap();

        let items = get_unsynced(&conn).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, b.id);
    }

    #[test]
    fn unsynced_count_tracks_inserts_and_deletes() {
        let conn = open_memory_database().unwrap();
        assert_eq!(unsynced_count(&conn).unwrap(), 0);
        let item = make_item("a");
        insert_pending(&conn, &item).unwrap();
        assert_eq!(unsynced_count(&conn).unwrap(), 1);
        delete_pending(&conn, &item.id).unwrap();
        assert_eq!(unsynced_count(&conn).unwrap(), 0);
    }
}
