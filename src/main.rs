use anyhow::{Context, Result};
use clap::Parser;
use prompt_compressor::config::{Config, LoggingConfig};
use prompt_compressor::metrics::METRICS;
use prompt_compressor::pipeline::{Pipeline, RaterMode, RunOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prompt-compressor")]
#[command(version, about = "Shrink a Markdown prompt to a token budget")]
struct Cli {
    /// Document to compress
    #[arg(default_value = "original-prompt.md")]
    input: PathBuf,

    /// Desired reduction, e.g. 0.30, 30 or 30%
    #[arg(short, long, default_value = "0.30")]
    reduce: String,

    /// Author intent or focus, passed to the rater and the shortener
    #[arg(short, long)]
    intent: Option<String>,

    /// Model used for shortening (overrides llm.model)
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file (defaults to prompt-compressor.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relevance rater: llm, keyword or uniform (overrides rater.mode)
    #[arg(long)]
    rater: Option<RaterMode>,

    /// Print Prometheus metrics to stderr after the run
    #[arg(long)]
    metrics: bool,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(rater) = cli.rater {
        config.rater.mode = rater;
    }
    init_tracing(&config.logging);

    let pipeline = Pipeline::from_config(config).context("Failed to initialize pipeline")?;
    let options = RunOptions {
        input: cli.input,
        reduce_by: cli.reduce,
        intent: cli.intent,
    };

    let summary = pipeline
        .run(&options)
        .await
        .with_context(|| format!("Compression of {} failed", options.input.display()))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if cli.metrics {
        eprintln!("{}", METRICS.export_prometheus());
    }
    Ok(())
}
