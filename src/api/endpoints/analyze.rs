//! Symptom analysis endpoint.
//!
//! Validation failures are surfaced immediately and never retried; only
//! requests that pass validation and admission reach the completion service.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config;
use crate::models::{AnalysisResult, PatientGender};
use crate::pipeline::prompt::build_analysis_prompt;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub symptoms: String,
    #[serde(default)]
    pub patient_age: Option<i64>,
    #[serde(default)]
    pub patient_gender: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub analysis: AnalysisResult,
}

/// `POST /api/analyze` — run one symptom analysis through the completion
/// service.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let symptoms = req.symptoms.trim();
    if symptoms.is_empty() {
        return Err(ApiError::BadRequest("Symptoms description is required".into()));
    }
    if symptoms.chars().count() > config::MAX_SYMPTOM_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Symptoms description exceeds {} characters",
            config::MAX_SYMPTOM_CHARS
        )));
    }
    if let Some(age) = req.patient_age {
        if !(0..=config::MAX_PATIENT_AGE).contains(&age) {
            return Err(ApiError::BadRequest(format!(
                "Patient age must be between 0 and {}",
                config::MAX_PATIENT_AGE
            )));
        }
    }
    let gender = match req.patient_gender.as_deref() {
        Some(raw) => Some(
            PatientGender::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unrecognized gender: {raw}")))?,
        ),
        None => None,
    };

    let identity = client_identity(&headers);
    {
        let mut limiter = ctx.rate_limiter.lock().expect("rate limiter lock");
        if let Err(retry_after) = limiter.check(&identity) {
            tracing::warn!(identity = %identity, retry_after, "Analyze admission denied");
            return Err(ApiError::RateLimited { retry_after });
        }
    }

    let language = req.language.as_deref().unwrap_or("en");
    tracing::info!(
        identity = %identity,
        language,
        symptom_chars = symptoms.chars().count(),
        "Analyzing symptoms"
    );

    let prompt = build_analysis_prompt(symptoms, language, req.patient_age, gender);
    let analysis = ctx.upstream.request(&prompt).await?;

    Ok(Json(AnalyzeResponse { analysis }))
}

/// Rate-limit identity: first hop of `x-forwarded-for`, then `x-real-ip`,
/// then a shared bucket.
fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_string()
}
