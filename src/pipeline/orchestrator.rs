//! The pipeline orchestrator: single entry point turning a symptom
//! description into a guaranteed-valid analysis.
//!
//! `analyze` never fails. Sequence: cache lookup -> in-flight join ->
//! connectivity check -> upstream attempt under the retry budget ->
//! rule-based fallback. Every successful result is cached under the input
//! fingerprint; archive writes are detached and their failures feed the
//! offline queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::watch;

use super::archive::{ArchiveRecord, ArchiveWriter};
use super::cache::AnalysisCache;
use super::classifier::classify;
use super::prompt::build_analysis_prompt;
use super::queue::OfflineQueue;
use super::upstream::UpstreamClient;
use crate::config;
use crate::db::DatabaseError;
use crate::models::AnalysisResult;

/// Normalized cache key: trimmed, lower-cased, whitespace-collapsed symptom
/// text prefixed with the language tag. Including the language keeps
/// same-spelling texts in different languages from colliding.
pub fn fingerprint(symptoms: &str, language: &str) -> String {
    let normalized = symptoms
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}:{normalized}", language.trim().to_lowercase())
}

type InFlightMap = HashMap<String, watch::Receiver<Option<AnalysisResult>>>;

/// One instance per process, injected into every call site.
pub struct TriageService {
    cache: AnalysisCache,
    queue: OfflineQueue,
    upstream: UpstreamClient,
    archive: Arc<dyn ArchiveWriter>,
    online: AtomicBool,
    in_flight: tokio::sync::Mutex<InFlightMap>,
}

impl TriageService {
    /// Build the service over a shared local database connection.
    /// Starts in the online state; connectivity events update the flag.
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        upstream: UpstreamClient,
        archive: Arc<dyn ArchiveWriter>,
    ) -> Result<Self, DatabaseError> {
        let cache = AnalysisCache::open(Arc::clone(&conn), config::CACHE_CAPACITY)?;
        let queue = OfflineQueue::new(conn);
        Ok(Self {
            cache,
            queue,
            upstream,
            archive,
            online: AtomicBool::new(true),
            in_flight: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Update the connectivity flag from a connectivity event.
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            tracing::info!(online, "Connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Items still awaiting a confirmed archive write.
    pub fn pending_count(&self) -> Result<u64, DatabaseError> {
        self.queue.pending_count()
    }

    /// Analyze a symptom description. Never fails: every internal error
    /// degrades to the rule-based classifier's deterministic answer.
    pub async fn analyze(&self, symptoms: &str, language: &str) -> AnalysisResult {
        let fp = fingerprint(symptoms, language);

        if let Some(hit) = self.cache.get(&fp) {
            tracing::debug!(fingerprint = %fp, "Cache hit");
            return hit;
        }

        // Coalesce concurrent identical queries: the first caller computes,
        // later callers await its published result.
        let leader_tx = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&fp) {
                Some(rx) => {
                    let rx = rx.clone();
                    drop(in_flight);
                    if let Some(result) = Self::join_in_flight(rx).await {
                        tracing::debug!(fingerprint = %fp, "Joined in-flight analysis");
                        return result;
                    }
                    // Leader vanished without publishing; compute alone.
                    None
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(fp.clone(), rx);
                    Some(tx)
                }
            }
        };

        let result = self.analyze_fresh(symptoms, language, &fp).await;

        if let Some(tx) = leader_tx {
            let _ = tx.send(Some(result.clone()));
            self.in_flight.lock().await.remove(&fp);
        }
        result
    }

    async fn join_in_flight(
        mut rx: watch::Receiver<Option<AnalysisResult>>,
    ) -> Option<AnalysisResult> {
        loop {
            let published = rx.borrow().clone();
            if published.is_some() {
                return published;
            }
            rx.changed().await.ok()?;
        }
    }

    async fn analyze_fresh(&self, symptoms: &str, language: &str, fp: &str) -> AnalysisResult {
        if self.is_online() {
            let prompt = build_analysis_prompt(symptoms, language, None, None);
            match self.upstream.request(&prompt).await {
                Ok(result) => {
                    self.store_in_cache(fp, &result);
                    self.spawn_archive_write(symptoms, language, result.clone());
                    return result;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream analysis failed, using rule-based fallback");
                }
            }
        } else {
            tracing::debug!("Client offline, using rule-based fallback");
        }

        let result = classify(symptoms);
        // Fallback results are cached like remote ones so repeated offline
        // queries stay O(1) and deterministic.
        self.store_in_cache(fp, &result);
        if !self.is_online() {
            if let Err(e) = self.queue.enqueue(symptoms, language, &result) {
                tracing::error!(error = %e, "Failed to queue offline analysis");
            }
        }
        result
    }

    fn store_in_cache(&self, fp: &str, result: &AnalysisResult) {
        if let Err(e) = self.cache.put(fp, result) {
            tracing::warn!(fingerprint = %fp, error = %e, "Cache write failed");
        }
    }

    /// Detached archive write. Must never delay the caller's response;
    /// a failure lands the analysis in the offline queue instead.
    fn spawn_archive_write(&self, symptoms: &str, language: &str, result: AnalysisResult) {
        let archive = Arc::clone(&self.archive);
        let queue = self.queue.clone();
        let symptoms = symptoms.to_string();
        let language = language.to_string();
        tokio::spawn(async move {
            archive_or_enqueue(archive.as_ref(), &queue, &symptoms, &language, &result).await;
        });
    }

    /// Replay queued analyses against the archive. Idempotent and safe to
    /// call repeatedly; a no-op while offline.
    pub async fn sync_pending(&self) {
        if !self.is_online() {
            tracing::debug!("Offline, skipping pending sync");
            return;
        }
        let report = self.queue.drain_and_sync(self.archive.as_ref()).await;
        if report.synced > 0 || report.failed > 0 {
            tracing::info!(synced = report.synced, failed = report.failed, "Pending sync pass complete");
        }
    }
}

/// Write one analysis to the archive, falling back to the offline queue.
pub(crate) async fn archive_or_enqueue(
    archive: &dyn ArchiveWriter,
    queue: &OfflineQueue,
    symptoms: &str,
    language: &str,
    result: &AnalysisResult,
) {
    let record = ArchiveRecord::new(symptoms, language, result);
    if let Err(e) = archive.write(&record).await {
        tracing::warn!(error = %e, "Archive write failed, queueing for later sync");
        if let Err(e) = queue.enqueue(symptoms, language, result) {
            tracing::error!(error = %e, "Failed to queue analysis after archive failure");
        }
    }
}
