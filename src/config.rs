//! Configuration: built-in defaults, an optional TOML file, then
//! `COMPRESSOR__SECTION__KEY` environment overrides.

use crate::compression::TokenizerMode;
use crate::error::{CompressError, Result};
use crate::pipeline::RaterMode;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "prompt-compressor.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub compression: CompressionConfig,

    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub rater: RaterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load from a specific file; the file must exist
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::build(Some(path.as_ref()), true)
    }

    /// Load from `path` if given, else from `prompt-compressor.toml` when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::build(Some(path), true),
            None => Self::build(Some(Path::new(DEFAULT_CONFIG_FILE)), false),
        }
    }

    fn build(path: Option<&Path>, required: bool) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(required));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("COMPRESSOR")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CompressError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the compression loop cannot work with
    pub fn validate(&self) -> Result<()> {
        let step = self.compression.step_fraction;
        if !(step > 0.0 && step <= 1.0) {
            return Err(CompressError::Configuration(format!(
                "compression.step_fraction must be in (0, 1], got {}",
                step
            )));
        }
        if self.compression.max_input_chars == 0 {
            return Err(CompressError::Configuration(
                "compression.max_input_chars must be positive".to_string(),
            ));
        }
        if self.segmenter.max_segment_tokens == 0 {
            return Err(CompressError::Configuration(
                "segmenter.max_segment_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote chat model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Chat-completions URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model used for shortening and rating
    #[serde(default = "default_model")]
    pub model: String,

    /// Explicit key; when unset the key is resolved from `api_key_env`
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// API key environment variable
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Key-value file consulted when the variable is not set
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base backoff in milliseconds, doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,
}

fn default_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_model() -> String { "gpt-4.1".to_string() }
fn default_api_key_env() -> String { "OPENAI_API_KEY".to_string() }
fn default_env_file() -> PathBuf { PathBuf::from(".env") }
fn default_timeout_secs() -> u64 { 60 }
fn default_max_retries() -> usize { 3 }
fn default_retry_backoff_ms() -> u64 { 100 }
fn default_max_output_tokens() -> usize { 2048 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            env_file: default_env_file(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: 0.0,
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Compression loop tuning
#[derive(Debug, Clone, Deserialize)]
pub struct CompressionConfig {
    /// Hard cap on outer passes
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Largest share of a segment removed by one request
    #[serde(default = "default_step_fraction")]
    pub step_fraction: f64,

    /// Characters of segment text sent per request
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_max_passes() -> usize { 64 }
fn default_step_fraction() -> f64 { 0.3 }
fn default_max_input_chars() -> usize { 12_000 }

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
            step_fraction: default_step_fraction(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub mode: TokenizerMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmenterConfig {
    /// Consecutive blocks are merged up to this size
    #[serde(default = "default_max_segment_tokens")]
    pub max_segment_tokens: usize,
}

fn default_max_segment_tokens() -> usize { 600 }

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self { max_segment_tokens: default_max_segment_tokens() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RaterConfig {
    #[serde(default)]
    pub mode: RaterMode,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}
