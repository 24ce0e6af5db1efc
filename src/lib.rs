//! Prompt compression to a token budget
//!
//! A document is split into segments, each segment is rated for relevance,
//! and the compression loop asks a text shortener to rewrite the least
//! relevant, largest segments until the document fits the target token
//! count or no rewrite makes progress.

pub mod compression;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;

pub use compression::{
    compress_to_target, CompressionLoop, CompressionReport, LoopOutcome, Segment, TextShortener,
    TokenCounter,
};
pub use config::Config;
pub use error::{CompressError, Result};
pub use pipeline::{Pipeline, RunOptions, RunSummary};
