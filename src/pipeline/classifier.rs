//! Rule-based triage classifier: the guaranteed-available fallback.
//!
//! Deterministic keyword -> triage-record lookup over four tiers, checked
//! in priority order (emergency first). Record content mirrors the curated
//! offline triage database shipped with the app. Never fails: an unmatched
//! input gets a conservative default record.

use chrono::Utc;

use crate::models::{AnalysisResult, Provenance, Severity};

/// A keyword set mapped to a static triage record.
struct TriageRule {
    keywords: &'static [&'static str],
    severity: Severity,
    conditions: &'static [&'static str],
    recommendations: &'static [&'static str],
    urgency: &'static str,
    warning: Option<&'static str>,
    confidence: f64,
}

/// Rules in priority order: emergency, high, moderate, low.
/// First matching rule wins, so broad keywords ("fever") sit below their
/// severe variants ("high fever").
static TRIAGE_RULES: &[TriageRule] = &[
    // ── Emergency ────────────────────────────────────────────
    TriageRule {
        keywords: &["chest pain", "heart attack", "cardiac"],
        severity: Severity::Emergency,
        conditions: &["Heart attack", "Angina", "Pulmonary embolism", "Aortic dissection"],
        recommendations: &[
            "Call emergency services immediately (150)",
            "Chew aspirin if available and not allergic",
            "Sit upright and stay calm",
            "Do not drive yourself to hospital",
            "Loosen tight clothing",
        ],
        urgency: "SEEK IMMEDIATE MEDICAL ATTENTION",
        warning: Some("This could be life-threatening - do not delay emergency care"),
        confidence: 0.9,
    },
    TriageRule {
        keywords: &[
            "difficulty breathing",
            "can't breathe",
            "shortness of breath",
            "breathing problem",
        ],
        severity: Severity::Emergency,
        conditions: &["Asthma attack", "Pneumonia", "Heart failure", "Allergic reaction"],
        recommendations: &[
            "Call emergency services if severe (150)",
            "Sit upright and try to stay calm",
            "Use rescue inhaler if available",
            "Remove any tight clothing",
            "Seek immediate medical attention",
        ],
        urgency: "URGENT - Seek immediate medical care",
        warning: Some("Breathing difficulties can be life-threatening"),
        confidence: 0.85,
    },
    TriageRule {
        keywords: &["severe bleeding", "heavy bleeding", "blood loss"],
        severity: Severity::Emergency,
        conditions: &["Trauma", "Internal bleeding", "Medication side effects"],
        recommendations: &[
            "Call emergency services immediately (150)",
            "Apply direct pressure to wound if external",
            "Elevate injured area if possible",
            "Do not remove embedded objects",
            "Monitor for signs of shock",
        ],
        urgency: "EMERGENCY - Immediate medical attention required",
        warning: Some("Severe bleeding requires immediate professional care"),
        confidence: 0.95,
    },
    // ── High ─────────────────────────────────────────────────
    TriageRule {
        keywords: &["high fever", "fever 39", "fever 40", "very hot"],
        severity: Severity::High,
        conditions: &["Severe infection", "Meningitis", "Sepsis", "Heat stroke"],
        recommendations: &[
            "Seek medical attention immediately if fever >39C (102F)",
            "Take paracetamol or ibuprofen as directed",
            "Stay hydrated with water or oral rehydration solution",
            "Use cool compresses on forehead",
            "Monitor for worsening symptoms",
        ],
        urgency: "Seek medical care within 2-4 hours",
        warning: Some("High fever can indicate serious infection"),
        confidence: 0.8,
    },
    TriageRule {
        keywords: &["severe headache", "worst headache", "sudden headache"],
        severity: Severity::High,
        conditions: &["Migraine", "Meningitis", "Stroke", "Brain hemorrhage"],
        recommendations: &[
            "Seek immediate medical care if sudden severe headache",
            "Rest in dark, quiet room",
            "Take paracetamol as directed",
            "Apply cold compress to head",
            "Monitor for neck stiffness or vision changes",
        ],
        urgency: "Seek medical evaluation if severe or sudden onset",
        warning: Some("Sudden severe headache may indicate serious condition"),
        confidence: 0.75,
    },
    // ── Moderate ─────────────────────────────────────────────
    TriageRule {
        keywords: &["fever", "temperature", "hot"],
        severity: Severity::Moderate,
        conditions: &["Common cold", "Flu", "Viral infection", "Bacterial infection"],
        recommendations: &[
            "Rest and stay hydrated",
            "Take paracetamol for fever and pain",
            "Monitor temperature regularly",
            "Seek medical help if fever persists >3 days",
            "Watch for worsening symptoms",
        ],
        urgency: "Monitor closely, seek care if worsening",
        warning: None,
        confidence: 0.7,
    },
    TriageRule {
        keywords: &["cough", "coughing"],
        severity: Severity::Moderate,
        conditions: &["Bronchitis", "Pneumonia", "Asthma", "Allergies"],
        recommendations: &[
            "Stay hydrated to thin mucus",
            "Use honey for cough relief (not for children <1 year)",
            "Avoid smoke and irritants",
            "Seek medical care if cough persists >2 weeks",
            "Monitor for blood in sputum",
        ],
        urgency: "Monitor and seek care if persistent or worsening",
        warning: None,
        confidence: 0.65,
    },
    TriageRule {
        keywords: &["stomach pain", "abdominal pain", "belly pain"],
        severity: Severity::Moderate,
        conditions: &["Gastritis", "Food poisoning", "Appendicitis", "Gastroenteritis"],
        recommendations: &[
            "Avoid solid foods temporarily",
            "Stay hydrated with clear fluids",
            "Apply heat pad to abdomen",
            "Seek immediate care if severe or persistent pain",
            "Monitor for fever or vomiting",
        ],
        urgency: "Monitor closely, seek care if severe",
        warning: Some("Severe abdominal pain may require immediate attention"),
        confidence: 0.6,
    },
    // ── Low ──────────────────────────────────────────────────
    TriageRule {
        keywords: &["headache", "head pain"],
        severity: Severity::Low,
        conditions: &["Tension headache", "Dehydration", "Stress", "Eye strain"],
        recommendations: &[
            "Rest in quiet, dark room",
            "Stay hydrated with water",
            "Apply cold or warm compress",
            "Take paracetamol if needed",
            "Practice relaxation techniques",
        ],
        urgency: "Self-care recommended",
        warning: None,
        confidence: 0.8,
    },
    TriageRule {
        keywords: &["cold", "runny nose", "sneezing"],
        severity: Severity::Low,
        conditions: &["Viral upper respiratory infection", "Common cold", "Allergies"],
        recommendations: &[
            "Get plenty of rest",
            "Stay hydrated with warm fluids",
            "Use saline nasal rinse",
            "Gargle with warm salt water",
            "Seek care if symptoms worsen or persist >10 days",
        ],
        urgency: "Self-care with monitoring",
        warning: None,
        confidence: 0.75,
    },
    TriageRule {
        keywords: &["cut", "scratch", "wound"],
        severity: Severity::Low,
        conditions: &["Minor laceration", "Abrasion", "Superficial wound"],
        recommendations: &[
            "Clean wound with clean water",
            "Apply antiseptic if available",
            "Cover with clean bandage",
            "Change dressing daily",
            "Seek care if signs of infection develop",
        ],
        urgency: "Self-care appropriate",
        warning: None,
        confidence: 0.9,
    },
];

/// Classify a symptom description against the offline triage rules.
pub fn classify(symptoms: &str) -> AnalysisResult {
    let lowered = symptoms.to_lowercase();

    for rule in TRIAGE_RULES {
        if rule.keywords.iter().any(|kw| lowered.contains(kw)) {
            return build_result(rule);
        }
    }

    default_result()
}

fn build_result(rule: &TriageRule) -> AnalysisResult {
    AnalysisResult {
        severity: rule.severity,
        possible_conditions: rule.conditions.iter().map(|s| s.to_string()).collect(),
        recommendations: rule.recommendations.iter().map(|s| s.to_string()).collect(),
        urgency: rule.urgency.to_string(),
        warning: rule.warning.map(|s| s.to_string()),
        additional_info: None,
        confidence: rule.confidence,
        source: Provenance::Fallback,
        timestamp: Utc::now(),
    }
}

/// Conservative record for symptoms no rule matches.
fn default_result() -> AnalysisResult {
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
            "Keep a record of symptom changes".into(),
        ],
        urgency: "Professional medical evaluation recommended".into(),
        warning: Some(
            "This analysis is based on limited information. Professional medical advice is recommended."
                .into(),
        ),
        additional_info: None,
        confidence: 0.3,
        source: Provenance::Fallback,
        timestamp: Utc::now(),
    }
}
