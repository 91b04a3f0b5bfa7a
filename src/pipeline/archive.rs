//! Durable remote archive boundary.
//!
//! The archive is the long-term store of analyses. Writes are best-effort
//! from the pipeline's perspective: a failure feeds the offline queue and
//! never delays or fails the caller's analysis.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{AnalysisResult, Severity};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive unreachable: {0}")]
    Unreachable(String),

    #[error("archive rejected write with status {status}")]
    Rejected { status: u16 },
}

/// Append-only archive row. Severity and recommendations are denormalized
/// out of the analysis for server-side querying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveRecord {
    pub symptoms: String,
    pub language: String,
    pub analysis: AnalysisResult,
    pub severity: Severity,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ArchiveRecord {
    pub fn new(symptoms: &str, language: &str, analysis: &AnalysisResult) -> Self {
        Self {
            symptoms: symptoms.to_string(),
            language: language.to_string(),
            severity: analysis.severity,
            recommendations: analysis.recommendations.clone(),
            created_at: Utc::now(),
            analysis: analysis.clone(),
        }
    }
}

/// Append-only write to the durable archive.
#[async_trait::async_trait]
pub trait ArchiveWriter: Send + Sync {
    async fn write(&self, record: &ArchiveRecord) -> Result<(), ArchiveError>;
}

/// HTTP archive client posting one JSON row per write.
pub struct HttpArchive {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpArchive {
    pub fn new(endpoint: &str, api_key: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl ArchiveWriter for HttpArchive {
    async fn write(&self, record: &ArchiveRecord) -> Result<(), ArchiveError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(record)
            .send()
            .await
            .map_err(|e| ArchiveError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Mock archive for testing
// ═══════════════════════════════════════════════════════════

/// In-memory archive: records successful writes and fails on demand.
/// Failures are keyed by symptom text so tests can target one item.
#[derive(Default)]
pub struct MockArchive {
    records: Mutex<Vec<ArchiveRecord>>,
    failing: Mutex<HashSet<String>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes for this symptom text fail until cleared.
    pub fn fail_for(&self, symptoms: &str) {
        self.failing
            .lock()
            .expect("mock archive lock")
            .insert(symptoms.to_string());
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.failing.lock().expect("mock archive lock").clear();
    }

    /// Successfully archived records, in write order.
    pub fn records(&self) -> Vec<ArchiveRecord> {
        self.records.lock().expect("mock archive lock").clone()
    }

    /// Count of archived records for one symptom text.
    pub fn count_for(&self, symptoms: &str) -> usize {
        self.records()
            .iter()
            .filter(|r| r.symptoms == symptoms)
            .count()
    }
}

#[async_trait::async_trait]
impl ArchiveWriter for MockArchive {
    async fn write(&self, record: &ArchiveRecord) -> Result<(), ArchiveError> {
        let failing = self.failing.lock().expect("mock archive lock");
        if failing.contains(&record.symptoms) {
            return Err(ArchiveError::Unreachable("injected failure".into()));
        }
        drop(failing);

        self.records
            .lock()
            .expect("mock archive lock")
            .push(record.clone());
        Ok(())
    }
}
