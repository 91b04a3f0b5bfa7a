//! Two-layer result cache: a bounded in-memory LRU over the persistent
//! `analysis_cache` table.
//!
//! The persistent store is the source of truth and survives restarts; the
//! hot layer is rehydrated from it at construction and bounds memory. A hot
//! miss falls through to the store, so LRU eviction never loses entries.
//! Entries are never invalidated within a session.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use rusqlite::Connection;

use crate::db::repository::analysis_cache;
use crate::db::DatabaseError;
use crate::models::AnalysisResult;

pub struct AnalysisCache {
    conn: Arc<Mutex<Connection>>,
    hot: Mutex<LruCache<String, AnalysisResult>>,
}

impl AnalysisCache {
    /// Open the cache over a shared connection, rehydrating the most recent
    /// rows into the hot layer.
    pub fn open(conn: Arc<Mutex<Connection>>, capacity: usize) -> Result<Self, DatabaseError> {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let mut hot = LruCache::new(capacity);

        let entries = {
            let conn = conn.lock().expect("cache connection lock");
            analysis_cache::load_recent_cached(&conn, capacity.get())?
        };
        for (fingerprint, result) in entries {
            hot.put(fingerprint, result);
        }
        tracing::info!(entries = hot.len(), "Rehydrated analysis cache");

        Ok(Self {
            conn,
            hot: Mutex::new(hot),
        })
    }

    /// Look up a fingerprint; promotes a persistent-store hit into the hot
    /// layer.
    pub fn get(&self, fingerprint: &str) -> Option<AnalysisResult> {
        if let Some(hit) = self.hot.lock().expect("cache lock").get(fingerprint) {
            return Some(hit.clone());
        }

        let from_store = {
            let conn = self.conn.lock().expect("cache connection lock");
            analysis_cache::get_cached_analysis(&conn, fingerprint)
        };
        match from_store {
            Ok(Some(result)) => {
                self.hot
                    .lock()
                    .expect("cache lock")
                    .put(fingerprint.to_string(), result.clone());
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%fingerprint, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Store a result under a fingerprint in both layers.
    pub fn put(&self, fingerprint: &str, result: &AnalysisResult) -> Result<(), DatabaseError> {
        self.hot
            .lock()
            .expect("cache lock")
            .put(fingerprint.to_string(), result.clone());
        let conn = self.conn.lock().expect("cache connection lock");
        analysis_cache::upsert_cached_analysis(&conn, fingerprint, result)
    }
}
