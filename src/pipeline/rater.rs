//! Relevance rating of segments against the author's intent.
//!
//! Scores run from 0 (expendable) to 10 (essential); unrated segments keep
//! the default 5.0.

use crate::compression::{Segment, DEFAULT_RELEVANCE};
use crate::config::LlmConfig;
use crate::llm::{ChatClient, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

const MAX_SCORE: f64 = 10.0;

/// Characters of each segment shown to the remote rater
const RATER_PREVIEW_CHARS: usize = 2_000;

/// Segments rated per remote request
const RATER_BATCH_SIZE: usize = 16;

/// Rater errors
#[derive(Debug, thiserror::Error)]
pub enum RaterError {
    #[error("Rating request failed: {0}")]
    Llm(#[from] LlmError),
}

/// Which rater the pipeline builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaterMode {
    #[default]
    Llm,
    Keyword,
    Uniform,
}

impl std::str::FromStr for RaterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "keyword" => Ok(Self::Keyword),
            "uniform" => Ok(Self::Uniform),
            other => Err(format!("unknown rater mode: {}", other)),
        }
    }
}

/// Assigns `relevance_score` to every segment
#[async_trait]
pub trait RelevanceRater: Send + Sync {
    async fn rate(&self, segments: &mut [Segment], intent: Option<&str>) -> Result<(), RaterError>;
}

/// Leaves every segment at the default score
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRater;

#[async_trait]
impl RelevanceRater for UniformRater {
    async fn rate(&self, segments: &mut [Segment], _intent: Option<&str>) -> Result<(), RaterError> {
        for segment in segments.iter_mut() {
            segment.relevance_score = DEFAULT_RELEVANCE;
        }
        Ok(())
    }
}

/// Keyword overlap between each segment and the intent
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRater;

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

impl KeywordRater {
    /// Share of intent keywords present in `text`, scaled to 0-10
    pub fn score(text: &str, intent: &str) -> f64 {
        let wanted = keywords(intent);
        if wanted.is_empty() {
            return DEFAULT_RELEVANCE;
        }
        let present = keywords(text);
        let overlap = wanted.intersection(&present).count();
        MAX_SCORE * overlap as f64 / wanted.len() as f64
    }
}

#[async_trait]
impl RelevanceRater for KeywordRater {
    async fn rate(&self, segments: &mut [Segment], intent: Option<&str>) -> Result<(), RaterError> {
        for segment in segments.iter_mut() {
            segment.relevance_score = match intent {
                Some(intent) => Self::score(&segment.text, intent),
                None => DEFAULT_RELEVANCE,
            };
        }
        Ok(())
    }
}

/// Asks the chat model to score segments in batches
pub struct LlmRater {
    client: ChatClient,
}

impl LlmRater {
    pub fn new(config: LlmConfig) -> Result<Self, RaterError> {
        Ok(Self { client: ChatClient::new(config)? })
    }

    fn system_prompt(intent: Option<&str>) -> String {
        let mut prompt = String::from(
            "Rate how relevant each Markdown chunk is to the document's purpose, \
             from 0 (safe to condense heavily) to 10 (essential, keep intact). \
             Respond with JSON only: {\"scores\":[{\"index\":<chunk index>,\"score\":<0-10>}]}.",
        );
        if let Some(intent) = intent.filter(|i| !i.trim().is_empty()) {
            prompt.push_str(" Author intent: ");
            prompt.push_str(intent);
        }
        prompt
    }

    fn user_prompt(batch: &[Segment]) -> String {
        batch
            .iter()
            .map(|s| {
                let preview: String = s.text.chars().take(RATER_PREVIEW_CHARS).collect();
                format!("### Chunk {}\n{}", s.index, preview)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl RelevanceRater for LlmRater {
    async fn rate(&self, segments: &mut [Segment], intent: Option<&str>) -> Result<(), RaterError> {
        let system = Self::system_prompt(intent);
        for batch in segments.chunks_mut(RATER_BATCH_SIZE) {
            let user = Self::user_prompt(batch);
            let response = self.client.complete(&system, &user, 512).await?;
            let scores = response.as_deref().map(parse_scores).unwrap_or_default();
            if scores.is_empty() {
                warn!("Rater returned no usable scores for {} chunks", batch.len());
            }
            for segment in batch.iter_mut() {
                segment.relevance_score =
                    scores.get(&segment.index).copied().unwrap_or(DEFAULT_RELEVANCE);
            }
            debug!("Rated {} chunks", batch.len());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ScoreList {
    scores: Vec<ScoreEntry>,
}

#[derive(Debug, Deserialize)]
struct ScoreEntry {
    index: usize,
    score: f64,
}

/// Parse `{"scores":[...]}` from a model response, tolerating code fences
/// and surrounding prose. Scores are clamped to 0-10.
pub fn parse_scores(response: &str) -> HashMap<usize, f64> {
    let Some(json) = extract_json(response) else {
        return HashMap::new();
    };
    match serde_json::from_str::<ScoreList>(json) {
        Ok(list) => list
            .scores
            .into_iter()
            .filter(|entry| entry.score.is_finite())
            .map(|entry| (entry.index, entry.score.clamp(0.0, MAX_SCORE)))
            .collect(),
        Err(e) => {
            debug!("Unparsable rater response: {}", e);
            HashMap::new()
        }
    }
}

/// Outermost `{...}` span of the response
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}
