//! Resilient symptom analysis pipeline.
//!
//! Layers, outermost first: [`orchestrator::TriageService`] drives the
//! cache-first flow, [`upstream`] talks to the completion service under the
//! retry policy, [`parser`] turns completion text into a valid analysis,
//! [`classifier`] is the deterministic offline fallback, [`queue`] and
//! [`archive`] handle durable delivery of results.

pub mod archive;
pub mod cache;
pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod queue;
pub mod upstream;

pub use error::UpstreamError;
pub use orchestrator::{fingerprint, TriageService};
