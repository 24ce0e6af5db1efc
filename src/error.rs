//! Crate-level error type

use crate::compression::{BudgetError, ShortenerError};
use crate::llm::CredentialError;
use crate::pipeline::RaterError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a compression run
#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Shortener(#[from] ShortenerError),

    #[error(transparent)]
    Rater(#[from] RaterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CompressError>;
