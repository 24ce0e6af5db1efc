//! Chat-completions client with retry and lazy credential resolution

use super::credentials::{resolve_api_key, CredentialError};
use crate::config::LlmConfig;
use once_cell::sync::OnceCell;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// LLM client errors
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// OpenAI-compatible chat client
pub struct ChatClient {
    http: Client,
    config: LlmConfig,
    api_key: OnceCell<SecretString>,
}

impl ChatClient {
    /// Create a new chat client; no network or credential access happens here
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| LlmError::Initialization(e.to_string()))?;

        let api_key = OnceCell::new();
        if let Some(key) = config.api_key.clone() {
            let _ = api_key.set(key);
        }

        Ok(Self { http, config, api_key })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// The key is looked up once, on first use, and cached for the process
    fn api_key(&self) -> Result<&SecretString, LlmError> {
        self.api_key
            .get_or_try_init(|| resolve_api_key(&self.config.api_key_env, &self.config.env_file))
            .map_err(LlmError::from)
    }

    /// Send one system + user exchange and return the assistant text.
    ///
    /// `Ok(None)` means the service answered but produced no content.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: usize,
    ) -> Result<Option<String>, LlmError> {
        let api_key = self.api_key()?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: Some(max_tokens),
            temperature: Some(self.config.temperature),
        };

        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = backoff_delay(self.config.retry_backoff_ms, attempt);
                debug!("Retry attempt {} after {:?}", attempt, backoff);
                tokio::time::sleep(backoff).await;
            }

            let response = self
                .http
                .post(&self.config.endpoint)
                .bearer_auth(api_key.expose_secret())
                .json(&request)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(LlmError::Network(e.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let error = LlmError::Api(format!("HTTP {}: {}", status, body));
                if !is_retryable(status) {
                    return Err(error);
                }
                last_error = Some(error);
                continue;
            }

            let parsed = response
                .json::<ChatCompletionResponse>()
                .await
                .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

            return Ok(parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content));
        }

        warn!("Chat completion failed after {} attempts", attempts);
        Err(last_error.unwrap_or_else(|| LlmError::Api("no attempts made".to_string())))
    }
}

/// Longest wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// `base_ms * 2^attempt`, saturating and capped at [`MAX_BACKOFF`]
fn backoff_delay(base_ms: u64, attempt: usize) -> Duration {
    let factor = u32::try_from(attempt)
        .ok()
        .and_then(|shift| 1u64.checked_shl(shift))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
