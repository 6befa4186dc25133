//! The generation client adapter: the only component that talks to the
//! external service.
//!
//! The service is opaque and non-deterministic; given a prompt it returns
//! text, may fail, or may time out. The adapter's job is a uniform
//! `Result<String, TransportError>` with per-call timeout and its own
//! bounded retry for transient transport faults. Content-level retries live
//! in the pipeline and draw on a separate budget.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use tokio::time::sleep;

use crate::error::TransportError;
use crate::llm::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, RenderedPrompt,
    Tool,
};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// The opaque generation capability.
///
/// The pipeline is generic over this seam so tests can script responses
/// without a network. Implementations perform their own transient-fault
/// retries; a returned error means that budget is already exhausted.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        timeout: Duration,
    ) -> Result<String, TransportError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    transport_retries: u32,
    transport_backoff: Duration,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            transport_retries: 2,
            transport_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_transport_retry(mut self, retries: u32, initial_backoff: Duration) -> Self {
        self.transport_retries = retries;
        self.transport_backoff = initial_backoff;
        self
    }

    async fn generate_once(
        &self,
        prompt: &RenderedPrompt,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let generation_config = prompt.response_schema.as_ref().map(|schema| GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema.clone()),
        });

        let tools = prompt.enable_search.then(|| vec![Tool::google_search()]);

        let payload = GenerateContentRequest {
            contents: vec![Content::user(prompt.user.clone())],
            system_instruction: Some(Content::user(prompt.system.clone())),
            generation_config,
            tools,
        };

        let response = tokio::time::timeout(timeout, self.client.post(&url).json(&payload).send())
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(timeout)
                } else {
                    TransportError::Unknown(e.to_string())
                }
            })?;

        let status = response.status();
        if let Some(fault) = classify_status(status.as_u16()) {
            let body = response.text().await.unwrap_or_default();
            debug!("generation call failed (status {}): {}", status, body);
            return Err(fault);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Unknown(format!("unreadable response body: {}", e)))?;

        extract_text(body)
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(
        &self,
        prompt: &RenderedPrompt,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let mut attempt = 0u32;
        loop {
            match self.generate_once(prompt, timeout).await {
                Ok(text) => return Ok(text),
                Err(fault) if fault.is_transient() && attempt < self.transport_retries => {
                    let backoff = self
                        .transport_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "transient transport fault ({}), retrying in {:?} ({}/{})",
                        fault,
                        backoff,
                        attempt + 1,
                        self.transport_retries
                    );
                    sleep(backoff).await;
                    attempt += 1;
                }
                Err(fault) => return Err(fault),
            }
        }
    }
}

/// Map an HTTP status to a transport fault; `None` means success.
fn classify_status(status: u16) -> Option<TransportError> {
    match status {
        200..=299 => None,
        429 => Some(TransportError::RateLimited),
        500..=599 => Some(TransportError::ServiceUnavailable { status }),
        other => Some(TransportError::Unknown(format!(
            "unexpected status {}",
            other
        ))),
    }
}

/// Pull the first candidate's text out of a response body.
fn extract_text(body: GenerateContentResponse) -> Result<String, TransportError> {
    body.candidates
        .and_then(|mut candidates| {
            if candidates.is_empty() {
                None
            } else {
                Some(candidates.remove(0))
            }
        })
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| TransportError::Unknown("no candidates returned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{Candidate, CandidateContent, Part};

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(200), None);
        assert_eq!(classify_status(429), Some(TransportError::RateLimited));
        assert_eq!(
            classify_status(503),
            Some(TransportError::ServiceUnavailable { status: 503 })
        );
        assert!(matches!(
            classify_status(403),
            Some(TransportError::Unknown(_))
        ));
    }

    #[test]
    fn transient_faults_marked_for_client_retry() {
        assert!(TransportError::RateLimited.is_transient());
        assert!(TransportError::ServiceUnavailable { status: 500 }.is_transient());
        assert!(!TransportError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(!TransportError::Unknown("x".to_string()).is_transient());
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = GenerateContentResponse {
            candidates: Some(vec![Candidate {
                content: CandidateContent {
                    parts: vec![Part {
                        text: "{\"a\": 1}".to_string(),
                    }],
                },
            }]),
        };
        assert_eq!(extract_text(body).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn empty_candidates_is_transport_fault() {
        let body = GenerateContentResponse {
            candidates: Some(vec![]),
        };
        assert!(matches!(
            extract_text(body),
            Err(TransportError::Unknown(_))
        ));

        let body = GenerateContentResponse { candidates: None };
        assert!(matches!(
            extract_text(body),
            Err(TransportError::Unknown(_))
        ));
    }
}
