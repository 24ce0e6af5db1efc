//! Token counting using tiktoken, with a word-count fallback

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Token counter trait for different tokenization strategies
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in the given text
    fn count(&self, text: &str) -> usize;

    /// Count tokens for multiple texts
    fn count_all(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.count(t)).collect()
    }

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Tiktoken-based counter using cl100k_base
pub struct TiktokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TiktokenCounter {
    /// Create a new tiktoken counter with cl100k_base encoding
    pub fn new() -> anyhow::Result<Self> {
        let bpe = cl100k_base()?;
        Ok(Self { bpe: Arc::new(bpe) })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    fn name(&self) -> &'static str {
        "cl100k_base"
    }
}

/// Whitespace word counter, used when no tokenizer is available
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn name(&self) -> &'static str {
        "words"
    }
}

/// Which counter to build at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerMode {
    /// cl100k_base if it initialises, otherwise words
    #[default]
    Auto,
    Word,
}

/// Select a counter by availability
pub fn detect_counter(mode: TokenizerMode) -> Arc<dyn TokenCounter> {
    match mode {
        TokenizerMode::Word => Arc::new(WordCounter),
        TokenizerMode::Auto => match TiktokenCounter::new() {
            Ok(counter) => Arc::new(counter),
            Err(e) => {
                warn!("tiktoken unavailable ({}), falling back to word counts", e);
                Arc::new(WordCounter)
            }
        },
    }
}
