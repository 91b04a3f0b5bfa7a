//! Prompt construction for the completion service.

use crate::models::PatientGender;

/// Build the analysis prompt. The completion service is asked to answer
/// with a single JSON object so the parser can extract it reliably.
pub fn build_analysis_prompt(
    symptoms: &str,
    language: &str,
    patient_age: Option<i64>,
    patient_gender: Option<PatientGender>,
) -> String {
    let mut patient_context = String::new();
    if let Some(age) = patient_age {
        patient_context.push_str(&format!("Patient age: {age}. "));
    }
    if let Some(gender) = patient_gender {
        patient_context.push_str(&format!("Patient gender: {}. ", gender.as_str()));
    }

    format!(
        "You are a medical triage assistant. A patient describes their symptoms. \
         {patient_context}Respond in language \"{language}\" with a single JSON object \
         and nothing else, using exactly these fields:\n\
         {{\n\
           \"severity\": \"low\" | \"moderate\" | \"high\" | \"emergency\",\n\
           \"possibleConditions\": [\"...\"],\n\
           \"recommendations\": [\"...\"],\n\
           \"urgency\": \"...\",\n\
           \"warning\": \"...\" (optional),\n\
           \"additionalInfo\": \"...\" (optional),\n\
           \"confidence\": 0.0-1.0\n\
         }}\n\
         This is informational triage, not a diagnosis; always advise consulting \
         a healthcare professional for serious symptoms.\n\n\
         Symptoms: {symptoms}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_symptoms_and_language() {
        let prompt = build_analysis_prompt("fever and cough", "fr", None, None);
        assert!(prompt.contains("fever and cough"));
        assert!(prompt.contains("\"fr\""));
        assert!(prompt.contains("possibleConditions"));
    }

    #[test]
    fn patient_context_included_when_present() {
        let prompt = build_analysis_prompt(
            "chest pain",
            "en",
            Some(64),
            Some(PatientGender::Female),
        );
        assert!(prompt.contains("Patient age: 64."));
        assert!(prompt.contains("Patient gender: female."));
    }

    #[test]
    fn patient_context_omitted_when_absent() {
        let prompt = build_analysis_prompt("chest pain", "en", None, None);
        assert!(!prompt.contains("Patient age"));
        assert!(!prompt.contains("Patient gender"));
    }
}
