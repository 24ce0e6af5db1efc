//! Orchestration around the compression loop: segmentation, rating,
//! reassembly and the end-to-end file pipeline

pub mod assembler;
pub mod orchestrator;
pub mod rater;
pub mod segmenter;

pub use assembler::{assemble, recount};
pub use orchestrator::{compress_with_model, output_path_for, Pipeline, RunOptions, RunSummary};
pub use rater::{KeywordRater, LlmRater, RaterError, RaterMode, RelevanceRater, UniformRater};
pub use segmenter::split_markdown;
