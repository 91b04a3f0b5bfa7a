//! Client for the remote completion service, plus the retry policy
//! the orchestrator relies on.
//!
//! `CohereClient` speaks the service's generate protocol and maps HTTP
//! outcomes onto the [`UpstreamError`] taxonomy. `UpstreamClient` wraps any
//! `CompletionClient` with the bounded retry loop: 3 attempts total, linear
//! backoff, transient failures only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::UpstreamError;
use super::parser::parse_completion;
use crate::config;
use crate::models::AnalysisResult;

/// One bounded-time completion request. Implementations must map failures
/// onto the upstream taxonomy; the retry policy lives above this trait.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError>;
}

/// HTTP client for the Cohere generate endpoint.
pub struct CohereClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl CohereClient {
    /// Create a client with an explicit per-attempt timeout. The timeout is
    /// enforced by reqwest; an expired attempt drops the in-flight request.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Production client with the standard 30-second attempt timeout.
    pub fn with_default_timeout(base_url: &str, api_key: &str) -> Self {
        Self::new(base_url, api_key, config::UPSTREAM_TIMEOUT)
    }
}

/// Request body for the generate endpoint.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f64,
    k: u32,
    stop_sequences: [&'a str; 0],
    return_likelihoods: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct Generation {
    #[serde(default)]
    text: String,
}

#[async_trait::async_trait]
impl CompletionClient for CohereClient {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        let url = format!("{}/v1/generate", self.base_url);
        let body = GenerateRequest {
            model: config::COMPLETION_MODEL,
            prompt,
            max_tokens: config::COMPLETION_MAX_TOKENS,
            temperature: config::COMPLETION_TEMPERATURE,
            k: 0,
            stop_sequences: [],
            return_likelihoods: "NONE",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    UpstreamError::Unreachable(format!("connect to {}: {e}", self.base_url))
                } else {
                    UpstreamError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(UpstreamError::AuthFailure);
        }
        if status.as_u16() == 429 {
            return Err(UpstreamError::RateLimited);
        }
        if !status.is_success() {
            return Err(UpstreamError::Unreachable(format!(
                "completion service returned status {status}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        let text = parsed
            .generations
            .first()
            .map(|g| g.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                UpstreamError::MalformedResponse("no generations in response".into())
            })?;

        Ok(text)
    }
}

/// Retry wrapper over a [`CompletionClient`].
///
/// Attempt N's failure (when transient) waits N x the backoff unit before
/// resubmission. The backoff is linear, not exponential, matching the
/// observed service behavior under load.
pub struct UpstreamClient {
    completion: Arc<dyn CompletionClient>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl UpstreamClient {
    pub fn new(completion: Arc<dyn CompletionClient>) -> Self {
        Self::with_policy(completion, config::UPSTREAM_MAX_RETRIES, config::BACKOFF_UNIT)
    }

    pub fn with_policy(
        completion: Arc<dyn CompletionClient>,
        max_retries: u32,
        backoff_unit: Duration,
    ) -> Self {
        Self {
            completion,
            max_retries,
            backoff_unit,
        }
    }

    /// Issue a completion request under the retry budget and parse the
    /// resulting text. An unparseable completion is not an error: the parser
    /// substitutes a degraded analysis.
    pub async fn request(&self, prompt: &str) -> Result<AnalysisResult, UpstreamError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.completion.complete(prompt).await {
                Ok(text) => {
                    tracing::debug!(attempt, "Completion succeeded");
                    return Ok(parse_completion(&text));
                }
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let delay = self.backoff_unit * attempt;
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Completion failed, budget exhausted");
                    return Err(e);
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Mock completion client for testing
// ═══════════════════════════════════════════════════════════

/// Scripted outcome for [`MockCompletionClient`].
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Reply(String),
    Timeout,
    Unreachable,
    AuthFailure,
    RateLimited,
    Malformed,
}

impl MockOutcome {
    fn to_result(&self) -> Result<String, UpstreamError> {
        match self {
            MockOutcome::Reply(text) => Ok(text.clone()),
            MockOutcome::Timeout => Err(UpstreamError::Timeout(30)),
            MockOutcome::Unreachable => Err(UpstreamError::Unreachable("mock".into())),
            MockOutcome::AuthFailure => Err(UpstreamError::AuthFailure),
            MockOutcome::RateLimited => Err(UpstreamError::RateLimited),
            MockOutcome::Malformed => {
                Err(UpstreamError::MalformedResponse("mock shape failure".into()))
            }
        }
    }
}

/// Mock completion client: plays back a script of outcomes and counts
/// calls. The last scripted outcome repeats once the script is exhausted.
pub struct MockCompletionClient {
    script: Mutex<Vec<MockOutcome>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockCompletionClient {
    /// A client that always replies with the given completion text.
    pub fn replying(text: &str) -> Self {
        Self::scripted(vec![MockOutcome::Reply(text.to_string())])
    }

    /// A client that plays back `script` in order, repeating the final entry.
    pub fn scripted(script: Vec<MockOutcome>) -> Self {
        assert!(!script.is_empty(), "mock script must not be empty");
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Hold each call open for `delay` before resolving. Lets tests overlap
    /// concurrent requests deterministically under a paused clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, _prompt: &str) -> Result<String, UpstreamError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.script.lock().expect("mock script lock");
        let outcome = script.get(index).unwrap_or_else(|| {
            script.last().expect("script is non-empty")
        });
        outcome.to_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, Severity};

    const GOOD_COMPLETION: &str = r#"{"severity": "high",
        "possibleConditions": ["Severe infection"],
        "recommendations": ["Seek medical attention"],
        "urgency": "Seek care within 2-4 hours",
        "confidence": 0.8}"#;

    fn fast_client(mock: Arc<MockCompletionClient>) -> UpstreamClient {
        UpstreamClient::with_policy(mock, 2, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let mock = Arc::new(MockCompletionClient::replying(GOOD_COMPLETION));
        let client = fast_client(Arc::clone(&mock));

        let result = client.request("prompt").await.unwrap();
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.source, Provenance::Remote);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_uses_three_attempts() {
        let mock = Arc::new(MockCompletionClient::scripted(vec![
            MockOutcome::Timeout,
            MockOutcome::Unreachable,
            MockOutcome::Reply(GOOD_COMPLETION.into()),
        ]));
        let client = UpstreamClient::new(mock.clone());

        let result = client.request("prompt").await.unwrap();
        assert_eq!(result.source, Provenance::Remote);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_timeout_exhausts_after_exactly_three_attempts() {
        let mock = Arc::new(MockCompletionClient::scripted(vec![MockOutcome::Timeout]));
        let client = UpstreamClient::new(mock.clone());

        let err = client.request("prompt").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout(_)));
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let mock = Arc::new(MockCompletionClient::scripted(vec![MockOutcome::AuthFailure]));
        let client = fast_client(Arc::clone(&mock));

        let err = client.request("prompt").await.unwrap_err();
        assert!(matches!(err, UpstreamError::AuthFailure));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn rate_limited_is_not_retried() {
        let mock = Arc::new(MockCompletionClient::scripted(vec![MockOutcome::RateLimited]));
        let client = fast_client(Arc::clone(&mock));

        let err = client.request("prompt").await.unwrap_err();
        assert!(matches!(err, UpstreamError::RateLimited));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_response_is_not_retried() {
        let mock = Arc::new(MockCompletionClient::scripted(vec![MockOutcome::Malformed]));
        let client = fast_client(Arc::clone(&mock));

        let err = client.request("prompt").await.unwrap_err();
        assert!(matches!(err, UpstreamError::MalformedResponse(_)));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn unparseable_completion_degrades_instead_of_failing() {
        let mock = Arc::new(MockCompletionClient::replying("I cannot answer in JSON."));
        let client = fast_client(mock);

        let result = client.request("prompt").await.unwrap();
        assert_eq!(result.severity, Severity::Moderate);
        assert_eq!(result.confidence, 0.3);
        assert!(result.warning.is_some());
    }

    #[test]
    fn cohere_client_trims_trailing_slash() {
        let client = CohereClient::new("https://api.example.test/", "key", Duration::from_secs(5));
        assert_eq!(client.base_url, "https://api.example.test");
        assert_eq!(client.timeout_secs, 5);
    }
}
