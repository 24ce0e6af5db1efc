//! End-to-end run: segment, rate, plan, compress, recount, reassemble

use super::assembler::{assemble, recount};
use super::rater::{KeywordRater, LlmRater, RaterMode, RelevanceRater, UniformRater};
use super::segmenter::split_markdown;
use crate::compression::{
    detect_counter, parse_reduction, plan_budget, CompressionLoop, CompressionReport, LlmShortener,
    LoopConfig, LoopOutcome, Segment, TextShortener, TokenCounter,
};
use crate::config::Config;
use crate::error::{CompressError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Inputs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    /// Reduction as typed by the user, e.g. `0.30`, `30` or `30%`
    pub reduce_by: String,
    pub intent: Option<String>,
}

/// Machine-readable result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub file: PathBuf,
    pub output: PathBuf,
    pub original_tokens: usize,
    pub target_tokens: usize,
    pub final_tokens: usize,
    pub outcome: LoopOutcome,
    pub passes: usize,
    pub attempts: usize,
    pub completed_at: DateTime<Utc>,
}

/// `notes.md` becomes `notes.compressed.md`
pub fn output_path_for(input: &Path) -> PathBuf {
    input.with_extension("compressed.md")
}

/// Wires the collaborators around the compression loop
pub struct Pipeline {
    config: Config,
    counter: Arc<dyn TokenCounter>,
    shortener: Arc<dyn TextShortener>,
    rater: Arc<dyn RelevanceRater>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        counter: Arc<dyn TokenCounter>,
        shortener: Arc<dyn TextShortener>,
        rater: Arc<dyn RelevanceRater>,
    ) -> Self {
        Self { config, counter, shortener, rater }
    }

    /// Build the production pipeline described by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let counter = detect_counter(config.tokenizer.mode);
        let shortener: Arc<dyn TextShortener> = Arc::new(LlmShortener::new(config.llm.clone())?);
        let rater: Arc<dyn RelevanceRater> = match config.rater.mode {
            RaterMode::Llm => Arc::new(LlmRater::new(config.llm.clone())?),
            RaterMode::Keyword => Arc::new(KeywordRater),
            RaterMode::Uniform => Arc::new(UniformRater),
        };
        Ok(Self::new(config, counter, shortener, rater))
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Compress `input` and write `<stem>.compressed.md` beside it.
    ///
    /// The output file is only written once every earlier step succeeded.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let reduce_by = parse_reduction(&options.reduce_by)?;
        if !options.input.is_file() {
            return Err(CompressError::InputNotFound(options.input.clone()));
        }
        let text = tokio::fs::read_to_string(&options.input).await?;
        let intent = options.intent.as_deref().filter(|i| !i.trim().is_empty());

        let mut segments = split_markdown(
            &text,
            self.counter.as_ref(),
            self.config.segmenter.max_segment_tokens,
        );
        self.rater.rate(&mut segments, intent).await?;

        let budget = plan_budget(&segments, reduce_by);
        info!(
            "Tokens: original {} -> target {} ({:.0}%)",
            budget.current_tokens,
            budget.target_tokens,
            reduce_by * 100.0
        );

        let report = self.compress(&mut segments, budget.target_tokens, intent).await?;
        let final_tokens = recount(&mut segments, self.counter.as_ref());

        let output = output_path_for(&options.input);
        tokio::fs::write(&output, assemble(&segments)).await?;

        Ok(RunSummary {
            file: options.input.clone(),
            output,
            original_tokens: budget.current_tokens,
            target_tokens: budget.target_tokens,
            final_tokens,
            outcome: report.outcome,
            passes: report.passes,
            attempts: report.attempts,
            completed_at: Utc::now(),
        })
    }

    /// Run the compression loop over already rated segments
    pub async fn compress(
        &self,
        segments: &mut [Segment],
        target_tokens: usize,
        intent: Option<&str>,
    ) -> Result<CompressionReport> {
        let report = CompressionLoop::new(self.shortener.as_ref(), self.counter.as_ref())
            .with_config(LoopConfig::from(&self.config.compression))
            .run(segments, target_tokens, intent)
            .await?;
        Ok(report)
    }
}

/// Compress `segments` in place with the remote shortener running `model`
pub async fn compress_with_model(
    segments: &mut [Segment],
    target_tokens: usize,
    model: &str,
    intent: Option<&str>,
    config: &Config,
) -> Result<CompressionReport> {
    let mut config = config.clone();
    config.llm.model = model.to_string();
    Pipeline::from_config(config)?
        .compress(segments, target_tokens, intent)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("/tmp/original-prompt.md")),
            PathBuf::from("/tmp/original-prompt.compressed.md")
        );
        assert_eq!(output_path_for(Path::new("notes")), PathBuf::from("notes.compressed.md"));
    }

    #[tokio::test]
    async fn test_converged_input_needs_no_credentials() {
        let mut config = Config::default();
        config.llm.api_key_env = "PROMPT_COMPRESSOR_TEST_UNSET_KEY".to_string();
        config.llm.env_file = "/nonexistent/.env".into();
        config.tokenizer.mode = crate::compression::TokenizerMode::Word;

        let counter = crate::compression::WordCounter;
        let mut segments = vec![Segment::new(0, "short text", 0, &counter)];
        let report = compress_with_model(&mut segments, 10, "gpt-4.1-mini", None, &config)
            .await
            .unwrap();
        assert_eq!(report.outcome, LoopOutcome::Converged);
        assert_eq!(report.attempts, 0);
    }
}
