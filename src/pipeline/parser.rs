//! Turn a free-text completion into a structured `AnalysisResult`.
//!
//! The completion service returns prose with an embedded JSON object. The
//! parser pulls out the first balanced `{...}` substring and deserializes
//! it leniently. Parsing is infallible from the caller's perspective: any
//! failure substitutes a conservative degraded result rather than an error.

use chrono::Utc;
use serde::Deserialize;

use crate::models::{clamp_confidence, AnalysisResult, Provenance, Severity};

/// Confidence assigned when the completion could not be parsed.
const DEGRADED_CONFIDENCE: f64 = 0.3;

/// Structured payload the prompt asks the model to emit.
/// Field names follow the wire format; older completions used
/// `recommendedActions` and `urgencyLevel`, so both spellings are accepted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemotePayload {
    #[serde(alias = "urgencyLevel")]
    severity: Option<String>,
    possible_conditions: Option<Vec<String>>,
    #[serde(alias = "recommendedActions")]
    recommendations: Option<Vec<String>>,
    urgency: Option<String>,
    warning: Option<String>,
    additional_info: Option<String>,
    confidence: Option<f64>,
}

/// Parse a completion into an analysis. Never fails.
pub fn parse_completion(text: &str) -> AnalysisResult {
    match try_parse(text) {
        Some(result) => result,
        None => {
            tracing::warn!("Completion had no usable analysis payload, substituting degraded result");
            degraded_result()
        }
    }
}

fn try_parse(text: &str) -> Option<AnalysisResult> {
    let json = extract_balanced_json(text)?;
    let payload: RemotePayload = serde_json::from_str(json).ok()?;

    let possible_conditions = payload.possible_conditions.filter(|c| !c.is_empty())?;
    let recommendations = payload.recommendations.filter(|r| !r.is_empty())?;

    Some(AnalysisResult {
        severity: payload
            .severity
            .as_deref()
            .map(Severity::parse_lenient)
            .unwrap_or(Severity::Moderate),
        possible_conditions,
        recommendations,
        urgency: payload
            .urgency
            .unwrap_or_else(|| "Monitor closely and seek medical advice if symptoms worsen".into()),
        warning: payload.warning,
        additional_info: payload.additional_info,
        confidence: clamp_confidence(payload.confidence.unwrap_or(DEGRADED_CONFIDENCE)),
        source: Provenance::Remote,
        timestamp: Utc::now(),
    })
}

/// Find the first balanced `{...}` substring, respecting JSON strings.
fn extract_balanced_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Conservative stand-in when the completion cannot be parsed.
/// The explicit warning is the caller's signal that the analysis is degraded.
pub fn degraded_result() -> AnalysisResult {
    AnalysisResult {
        severity: Severity::Moderate,
        possible_conditions: vec![
            "Multiple possible conditions - professional evaluation needed".into(),
        ],
        recommendations: vec![
            "Monitor symptoms closely".into(),
            "Stay hydrated and rest".into(),
            "Consult healthcare provider for proper diagnosis".into(),
            "Seek immediate help if symptoms worsen significantly".into(),
        ],
        urgency: "Professional medical evaluation recommended".into(),
        warning: Some(
            "This analysis is based on limited information. Professional medical advice is recommended."
                .into(),
        ),
        additional_info: None,
        confidence: DEGRADED_CONFIDENCE,
        source: Provenance::Remote,
        timestamp: Utc::now(),
    }
}
