//! Text shortening capability: a remote LLM implementation and a
//! deterministic truncation stub

use crate::config::LlmConfig;
use crate::llm::{ChatClient, LlmError};
use async_trait::async_trait;
use tracing::debug;

/// One shortening request
#[derive(Debug, Clone, Copy)]
pub struct ShortenRequest<'a> {
    /// Text to shorten, already capped to the request size limit
    pub text: &'a str,
    /// Token ceiling for the result
    pub max_tokens: usize,
    /// Compression instructions, see [`compression_directive`]
    pub directive: &'a str,
    pub intent: Option<&'a str>,
}

/// Shortener trait for different rewriting strategies
#[async_trait]
pub trait TextShortener: Send + Sync {
    /// Return a shortened version of `request.text`.
    ///
    /// An empty string means the capability produced nothing usable; the
    /// caller keeps the original text in that case.
    async fn shorten(&self, request: ShortenRequest<'_>) -> Result<String, ShortenerError>;
}

/// Shortener errors
#[derive(Debug, thiserror::Error)]
pub enum ShortenerError {
    #[error("Shortening request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Shortener unavailable: {0}")]
    Unavailable(String),
}

/// Fixed instructions sent with every shortening request
pub fn compression_directive(max_tokens: usize, intent: Option<&str>) -> String {
    let mut directive = format!(
        "Shorten the Markdown chunk conservatively. Preserve meaning. \
         KEEP code fences unchanged; do not alter code. Keep headings/lists. \
         Aim for <= {} tokens (roughly words). Return only the chunk.",
        max_tokens
    );
    if let Some(intent) = intent.filter(|i| !i.trim().is_empty()) {
        directive.push_str(" Author intent: ");
        directive.push_str(intent);
    }
    directive
}

/// Shortener backed by an OpenAI-compatible chat model
pub struct LlmShortener {
    client: ChatClient,
}

impl LlmShortener {
    pub fn new(config: LlmConfig) -> Result<Self, ShortenerError> {
        Ok(Self { client: ChatClient::new(config)? })
    }

    pub fn with_client(client: ChatClient) -> Self {
        Self { client }
    }

    pub fn model(&self) -> &str {
        &self.client.config().model
    }
}

#[async_trait]
impl TextShortener for LlmShortener {
    async fn shorten(&self, request: ShortenRequest<'_>) -> Result<String, ShortenerError> {
        debug!(
            "Requesting shortening to <= {} tokens from {}",
            request.max_tokens,
            self.model()
        );

        let user = format!("```md\n{}\n```", request.text);
        let output = self
            .client
            .complete(request.directive, &user, self.client.config().max_output_tokens)
            .await?;

        Ok(output.map(|text| strip_md_fence(text.trim()).to_string()).unwrap_or_default())
    }
}

/// Remove a single enclosing ```md fence echoed back by the model
fn strip_md_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```md").or_else(|| text.strip_prefix("```markdown"))
    else {
        return text;
    };
    let Some(rest) = rest.strip_prefix('\n') else {
        return text;
    };
    match rest.strip_suffix("```") {
        Some(inner) => inner.trim_end_matches('\n'),
        None => text,
    }
}

/// Deterministic stub: keep the first `max_tokens` whitespace-delimited words
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatingShortener;

#[async_trait]
impl TextShortener for TruncatingShortener {
    async fn shorten(&self, request: ShortenRequest<'_>) -> Result<String, ShortenerError> {
        Ok(word_prefix(request.text, request.max_tokens).to_string())
    }
}

/// Prefix of `text` ending after its `n`-th word, line breaks intact
fn word_prefix(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if !c.is_whitespace() {
            in_word = true;
        } else if in_word {
            in_word = false;
            words += 1;
            if words == n {
                return &text[..i];
            }
        }
    }
    text
}
