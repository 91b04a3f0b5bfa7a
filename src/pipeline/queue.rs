//! Offline durable queue: analyses awaiting a confirmed archive write.
//!
//! At-least-once delivery: an item is removed only after the archive
//! acknowledges it, so a crash mid-drain leaves the remainder for the next
//! attempt. Items are processed independently; one failure never blocks
//! the rest of the drain.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use super::archive::{ArchiveRecord, ArchiveWriter};
use crate::db::repository::pending_sync;
use crate::db::DatabaseError;
use crate::models::AnalysisResult;

/// Outcome of one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub synced: usize,
    pub failed: usize,
}

/// Handle over the persistent queue. Cheap to clone; the connection is
/// shared with the result cache.
#[derive(Clone)]
pub struct OfflineQueue {
    conn: Arc<Mutex<Connection>>,
}

impl OfflineQueue {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Append an analysis for later archive delivery.
    pub fn enqueue(
        &self,
        symptoms: &str,
        language: &str,
        analysis: &AnalysisResult,
    ) -> Result<(), DatabaseError> {
        let item = pending_sync::PendingSyncItem::new(symptoms, language, analysis.clone());
        let conn = self.conn.lock().expect("queue connection lock");
        pending_sync::insert_pending(&conn, &item)?;
        tracing::debug!(id = %item.id, "Queued analysis for archive sync");
        Ok(())
    }

    /// Number of items still awaiting delivery.
    pub fn pending_count(&self) -> Result<u64, DatabaseError> {
        let conn = self.conn.lock().expect("queue connection lock");
        pending_sync::unsynced_count(&conn)
    }

    /// Replay every pending item against the archive. Each item is deleted
    /// only after its write is confirmed; failed items stay queued.
    pub async fn drain_and_sync(&self, archive: &dyn ArchiveWriter) -> DrainReport {
        let items = {
            let conn = self.conn.lock().expect("queue connection lock");
            match pending_sync::get_unsynced(&conn) {
                Ok(items) => items,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read pending sync items");
                    return DrainReport::default();
                }
            }
        };

        if items.is_empty() {
            return DrainReport::default();
        }
        tracing::info!(count = items.len(), "Draining offline sync queue");

        let mut report = DrainReport::default();
        for item in items {
            let record = ArchiveRecord::new(&item.symptoms, &item.language, &item.analysis);
            match archive.write(&record).await {
                Ok(()) => {
                    let conn = self.conn.lock().expect("queue connection lock");
                    match pending_sync::delete_pending(&conn, &item.id) {
                        Ok(()) => {
                            report.synced += 1;
                            tracing::debug!(id = %item.id, "Synced queued analysis");
                        }
                        Err(e) => {
                            // Archived but still queued: the next drain will
                            // retry and the archive sees a duplicate append.
                            report.failed += 1;
                            tracing::error!(id = %item.id, error = %e, "Failed to dequeue synced item");
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(id = %item.id, error = %e, "Archive write failed, item stays queued");
                }
            }
        }
        report
    }
}
