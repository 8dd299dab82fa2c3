//! Credit Scoring - command line entry point
//!
//! Trains or loads the model artifacts and scores applicants read from JSON,
//! either one at a time or as a JSON-lines batch on a bounded worker pool.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credit_scoring::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    metrics::ScoringMetrics,
    ApplicantRecord, CreditReport, ModelStore, ScoringEngine,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "credit-scoring", version, about = "Score credit applicants")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a fresh model and overwrite the stored artifacts
    Train,
    /// Score a single applicant from a JSON file
    Score {
        /// JSON file with one applicant
        input: PathBuf,
    },
    /// Score a JSON-lines file, one applicant per line
    Batch {
        /// JSON-lines file of applicants
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)?;
    init_logging(&config.logging)?;
    info!(config = %cli.config.display(), models_dir = %config.models.models_dir, "Configuration loaded");

    let store = Arc::new(ModelStore::from_config(&config));

    match cli.command {
        Command::Train => {
            let artifacts = tokio::task::spawn_blocking(move || store.retrain()).await??;
            info!(
                run_id = %artifacts.run_id,
                trees = artifacts.model.tree_count(),
                "Training complete"
            );
        }
        Command::Score { input } => {
            let engine = load_engine(store).await?;
            let report = score_file(&engine, &input).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Batch { input } => {
            let engine = load_engine(store).await?;
            let metrics = run_batch(engine, &input, config.pipeline.workers).await?;
            metrics.print_summary();
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("warn,credit_scoring={}", config.level)))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

/// Loading may train on a cold start, so keep it off the async workers.
async fn load_engine(store: Arc<ModelStore>) -> Result<ScoringEngine> {
    let engine = tokio::task::spawn_blocking(move || ScoringEngine::from_store(&store))
        .await?
        .context("Failed to load model artifacts")?;
    info!(run_id = %engine.run_id(), "Scoring engine ready");
    Ok(engine)
}

async fn score_file(engine: &ScoringEngine, input: &Path) -> Result<CreditReport> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let record: ApplicantRecord =
        serde_json::from_str(&raw).context("Failed to parse applicant record")?;

    record.validate()?;
    record.check_business_rules()?;

    info!(applicant = %record.name, "Processing credit score request");
    let result = engine.evaluate(&record)?;
    info!(
        applicant = %record.name,
        score = result.score,
        risk_level = %result.risk_level,
        "Credit score calculated"
    );

    Ok(CreditReport::new(record.name, result))
}

async fn run_batch(engine: ScoringEngine, input: &Path, workers: usize) -> Result<Arc<ScoringMetrics>> {
    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let mut lines = BufReader::new(file).split(b'\n');

    let metrics = Arc::new(ScoringMetrics::new());
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut line_no = 0usize;

    info!(input = %input.display(), workers, "Starting batch scoring");

    while let Some(bytes) = lines
        .next_segment()
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?
    {
        line_no += 1;
        let Some(line) = decode_line(line_no, bytes, &metrics) else {
            continue;
        };

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;
        let engine = engine.clone();
        let metrics = metrics.clone();

        tasks.spawn_blocking(move || {
            score_line(&engine, &metrics, line_no, &line);
            drop(permit);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Scoring task failed");
        }
    }

    Ok(metrics)
}

/// Blank lines are skipped; lines that are not UTF-8 count as rejections.
fn decode_line(line_no: usize, bytes: Vec<u8>, metrics: &ScoringMetrics) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(line),
        Err(e) => {
            warn!(line = line_no, error = %e, "Skipping line that is not valid UTF-8");
            metrics.record_rejection();
            None
        }
    }
}

fn score_line(engine: &ScoringEngine, metrics: &ScoringMetrics, line_no: usize, line: &str) {
    let started = Instant::now();

    let record: ApplicantRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            warn!(line = line_no, error = %e, "Failed to deserialize applicant");
            metrics.record_rejection();
            return;
        }
    };

    if let Err(e) = record.validate().and_then(|()| record.check_business_rules()) {
        warn!(line = line_no, applicant = %record.name, error = %e, "Applicant rejected");
        metrics.record_rejection();
        return;
    }

    match engine.evaluate(&record) {
        Ok(result) => {
            let processing_time = started.elapsed();
            metrics.record_score(processing_time, result.score, result.risk_level);
            debug!(
                line = line_no,
                applicant = %record.name,
                score = result.score,
                processing_time_us = processing_time.as_micros() as u64,
                "Applicant scored"
            );

            let report = CreditReport::new(record.name, result);
            match serde_json::to_string(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(line = line_no, error = %e, "Failed to serialize report"),
            }

            let count = metrics.records_scored.load(Ordering::Relaxed);
            if count % 100 == 0 {
                info!(
                    processed = count,
                    throughput = format!("{:.1} rec/s", metrics.get_throughput()),
                    avg_latency_us = metrics.get_processing_stats().mean_us,
                    "Processing milestone"
                );
            }
        }
        Err(e) => {
            error!(line = line_no, applicant = %record.name, error = %e, "Scoring failed");
            metrics.record_rejection();
        }
    }
}
