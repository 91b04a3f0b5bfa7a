pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

pub use models::{AnalysisResult, Provenance, Severity};
pub use pipeline::{fingerprint, TriageService};
