//! Data models for budget-driven compression

use super::token_estimator::TokenCounter;
use serde::{Deserialize, Serialize};

/// Relevance assigned to a segment before any rating has happened
pub const DEFAULT_RELEVANCE: f64 = 5.0;

fn default_relevance() -> f64 {
    DEFAULT_RELEVANCE
}

/// A contiguous, independently shortenable piece of a document.
///
/// Only `text` and `token_count` change during a compression run; `index`,
/// `start_offset` and `relevance_score` are fixed once the segment is built
/// and rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    /// Byte offset of the segment in the original document
    pub start_offset: usize,
    /// Cached token count of `text`
    #[serde(default)]
    pub token_count: usize,
    /// Lower means more expendable
    #[serde(default = "default_relevance")]
    pub relevance_score: f64,
}

impl Segment {
    /// Create a segment and count its tokens
    pub fn new(
        index: usize,
        text: impl Into<String>,
        start_offset: usize,
        counter: &dyn TokenCounter,
    ) -> Self {
        let text = text.into();
        let token_count = counter.count(&text);
        Self {
            index,
            text,
            start_offset,
            token_count,
            relevance_score: DEFAULT_RELEVANCE,
        }
    }

    /// Builder-style relevance override
    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = score;
        self
    }

    /// Replace the text and refresh the cached count in one step
    pub fn replace_text(&mut self, text: String, counter: &dyn TokenCounter) {
        self.token_count = counter.count(&text);
        self.text = text;
    }

    /// Recompute `token_count` from the current text
    pub fn refresh_count(&mut self, counter: &dyn TokenCounter) -> usize {
        self.token_count = counter.count(&self.text);
        self.token_count
    }
}

/// Sum of cached token counts
pub fn total_tokens(segments: &[Segment]) -> usize {
    segments.iter().map(|s| s.token_count).sum()
}

/// Current and target token totals for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub current_tokens: usize,
    pub target_tokens: usize,
}

impl Budget {
    /// Tokens still to remove, zero once the target is met
    pub fn excess(&self) -> usize {
        self.current_tokens.saturating_sub(self.target_tokens)
    }

    pub fn is_met(&self) -> bool {
        self.current_tokens <= self.target_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::token_estimator::WordCounter;

    #[test]
    fn test_new_segment_counts_tokens() {
        let seg = Segment::new(0, "one two three", 0, &WordCounter);
        assert_eq!(seg.token_count, 3);
        assert_eq!(seg.relevance_score, DEFAULT_RELEVANCE);
    }

    #[test]
    fn test_replace_text_keeps_count_in_sync() {
        let mut seg = Segment::new(0, "one two three four", 0, &WordCounter);
        seg.replace_text("one two".to_string(), &WordCounter);
        assert_eq!(seg.token_count, 2);
        assert_eq!(seg.text, "one two");
    }

    #[test]
    fn test_deserialize_defaults() {
        let seg: Segment =
            serde_json::from_str(r#"{"index": 2, "text": "a b", "start_offset": 10}"#).unwrap();
        assert_eq!(seg.token_count, 0);
        assert_eq!(seg.relevance_score, 5.0);
    }

    #[test]
    fn test_budget_excess() {
        let budget = Budget { current_tokens: 180, target_tokens: 120 };
        assert_eq!(budget.excess(), 60);
        assert!(!budget.is_met());

        let met = Budget { current_tokens: 100, target_tokens: 120 };
        assert_eq!(met.excess(), 0);
        assert!(met.is_met());
    }
}
