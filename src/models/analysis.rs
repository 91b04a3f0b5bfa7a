//! Canonical triage output types shared by the pipeline and the API layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound for reported confidence. Upstream values below this are clamped.
pub const MIN_CONFIDENCE: f64 = 0.1;
/// Upper bound for reported confidence.
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Triage severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Emergency,
}

impl Severity {
    /// Parse an upstream severity string leniently.
    ///
    /// Anything outside the four-value enum coerces to `Moderate`. The
    /// completion service has been observed returning "medium" and free-form
    /// variants, and a renderable result is always required.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Severity::Low,
            "moderate" | "medium" => Severity::Moderate,
            "high" => Severity::High,
            "emergency" => Severity::Emergency,
            _ => Severity::Moderate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Emergency => "emergency",
        }
    }
}

/// Where an analysis came from: the remote completion service or the
/// local rule-based fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Remote,
    Fallback,
}

/// Clamp a confidence score into the renderable range.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_CONFIDENCE;
    }
    value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// The canonical analysis object returned to the UI layer.
///
/// Every construction site guarantees `confidence` is within
/// [`MIN_CONFIDENCE`, `MAX_CONFIDENCE`] and `severity` is one of the four
/// enum values, so callers never need to re-validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub severity: Severity,
    pub possible_conditions: Vec<String>,
    pub recommendations: Vec<String>,
    pub urgency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    pub confidence: f64,
    pub source: Provenance,
    pub timestamp: DateTime<Utc>,
}

/// Patient gender as accepted by the analysis endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientGender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl PatientGender {
    /// Parse a request-supplied gender string. Returns `None` for values
    /// outside the accepted set (the caller surfaces a validation error).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "male" => Some(PatientGender::Male),
            "female" => Some(PatientGender::Female),
            "other" => Some(PatientGender::Other),
            "prefer_not_to_say" => Some(PatientGender::PreferNotToSay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatientGender::Male => "male",
            PatientGender::Female => "female",
            PatientGender::Other => "other",
            PatientGender::PreferNotToSay => "prefer not to say",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_low_to_emergency() {
        assert!(Severity::Low < Severity::Moderate);
        assert!(Severity::Moderate < Severity::High);
        assert!(Severity::High < Severity::Emergency);
    }

    #[test]
    fn severity_lenient_parse_known_values() {
        assert_eq!(Severity::parse_lenient("low"), Severity::Low);
        assert_eq!(Severity::parse_lenient("EMERGENCY"), Severity::Emergency);
        assert_eq!(Severity::parse_lenient(" high "), Severity::High);
    }

    #[test]
    fn severity_medium_coerces_to_moderate() {
        assert_eq!(Severity::parse_lenient("medium"), Severity::Moderate);
    }

    #[test]
    fn severity_unknown_coerces_to_moderate() {
        assert_eq!(Severity::parse_lenient("critical"), Severity::Moderate);
        assert_eq!(Severity::parse_lenient(""), Severity::Moderate);
    }

    #[test]
    fn confidence_clamped_above() {
        assert_eq!(clamp_confidence(1.7), 1.0);
    }

    #[test]
    fn confidence_clamped_below() {
        assert_eq!(clamp_confidence(-0.2), 0.1);
        assert_eq!(clamp_confidence(0.0), 0.1);
    }

    #[test]
    fn confidence_in_range_unchanged() {
        assert_eq!(clamp_confidence(0.65), 0.65);
    }

    #[test]
    fn confidence_nan_becomes_floor() {
        assert_eq!(clamp_confidence(f64::NAN), MIN_CONFIDENCE);
    }

    #[test]
    fn analysis_result_round_trips_through_json() {
        let result = AnalysisResult {
            severity: Severity::High,
            possible_conditions: vec!["Migraine".into()],
            recommendations: vec!["Rest in a dark room".into()],
            urgency: "Seek medical evaluation if severe".into(),
            warning: Some("Sudden severe headache may indicate serious condition".into()),
            additional_info: None,
            confidence: 0.75,
            source: Provenance::Remote,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"possibleConditions\""));
        assert!(json.contains("\"severity\":\"high\""));
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn gender_parse_accepts_known_values() {
        assert_eq!(PatientGender::parse("female"), Some(PatientGender::Female));
        assert_eq!(
            PatientGender::parse("prefer_not_to_say"),
            Some(PatientGender::PreferNotToSay)
        );
    }

    #[test]
    fn gender_parse_rejects_unknown() {
        assert_eq!(PatientGender::parse("unknown"), None);
    }
}
