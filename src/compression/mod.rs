//! Budget-driven compression of scored document segments
//!
//! The loop repeatedly shortens the least relevant, largest segment until
//! the summed token count reaches the target or a full pass makes no
//! progress.

pub mod budget;
pub mod compression_loop;
pub mod models;
pub mod selector;
pub mod shortener;
pub mod token_estimator;

pub use budget::{parse_reduction, plan_budget, BudgetError};
pub use compression_loop::{
    compress_to_target, CompressionLoop, CompressionReport, LoopConfig, LoopOutcome, LoopState,
};
pub use models::{total_tokens, Budget, Segment, DEFAULT_RELEVANCE};
pub use selector::candidate_order;
pub use shortener::{
    compression_directive, LlmShortener, ShortenRequest, ShortenerError, TextShortener,
    TruncatingShortener,
};
pub use token_estimator::{detect_counter, TiktokenCounter, TokenCounter, TokenizerMode, WordCounter};
