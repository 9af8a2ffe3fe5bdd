//! Kolosal Scoring CLI Module
//!
//! Command-line interface for the preprocessing and scoring jobs.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::export::LocalModelRegistry;
use crate::pipeline::{PreprocessJob, ScoringConfig, ScoringJob, ScoringRequest};
use crate::preprocessing::SplitConfig;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    println!("  {} {}", accent("›"), msg);
}

fn step_done(msg: &str, detail: &str) {
    println!("  {} {} {}", ok("✓"), msg, dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-scoring")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch scoring with per-feature attributions")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a raw dataset into train and test tables
    Preprocess {
        /// Raw dataset (CSV file or directory of CSV files)
        #[arg(long)]
        raw_dataset: PathBuf,

        /// Output directory for the train partition
        #[arg(long)]
        preprocessed_train_data: PathBuf,

        /// Output directory for the test partition
        #[arg(long)]
        preprocessed_test_data: PathBuf,

        /// Fraction of rows sent to the test partition
        #[arg(long, default_value = "0.3")]
        test_size: f64,

        /// Shuffle seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Score a batch with a registered model and attach attributions
    Score {
        /// Training data used for the background sample
        #[arg(long)]
        training_data: PathBuf,

        /// Directory holding the batch to score
        #[arg(long)]
        scoring_data: PathBuf,

        /// Registered model name
        #[arg(long)]
        model_name: String,

        /// Target column, dropped from both inputs when present
        #[arg(long)]
        target_column: String,

        /// Output directory for the scored table
        #[arg(long)]
        scored_data: PathBuf,

        /// Model registry directory
        #[arg(long, env = "KOLOSAL_MODEL_REGISTRY", default_value = "models")]
        model_registry: PathBuf,

        /// JSON configuration file; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum background rows
        #[arg(long)]
        background_size: Option<usize>,

        /// Permutations sampled per row
        #[arg(long)]
        n_permutations: Option<usize>,

        /// Seed for split, background and permutations
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads for attribution
        #[arg(long)]
        threads: Option<usize>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_preprocess(
    raw_dataset: &Path,
    train_dir: &Path,
    test_dir: &Path,
    test_size: f64,
    seed: u64,
) -> anyhow::Result<()> {
    section("Preprocess");

    step_run(&format!("Splitting {}", raw_dataset.display()));
    let start = Instant::now();
    let job = PreprocessJob::new(SplitConfig { test_size, random_state: seed });
    let report = job.run(raw_dataset, train_dir, test_dir)?;
    step_done("Split", &format!("{} rows in {:?}", report.source_rows, start.elapsed()));

    println!();
    println!("  {:<10} {:>8}  {}", muted("Train"), report.train_rows, report.train_path.display());
    println!("  {:<10} {:>8}  {}", muted("Test"), report.test_rows, report.test_path.display());
    println!();

    Ok(())
}

/// Overrides applied on top of the file or default configuration
#[derive(Debug, Clone, Default)]
pub struct ScoreOverrides {
    pub config: Option<PathBuf>,
    pub background_size: Option<usize>,
    pub n_permutations: Option<usize>,
    pub seed: Option<u64>,
    pub threads: Option<usize>,
}

impl ScoreOverrides {
    pub fn resolve(&self) -> crate::Result<ScoringConfig> {
        let mut config = match &self.config {
            Some(path) => ScoringConfig::from_json_file(path)?,
            None => ScoringConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(size) = self.background_size {
            config = config.with_background_size(size);
        }
        if let Some(n) = self.n_permutations {
            config = config.with_n_permutations(n);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn cmd_score(
    request: &ScoringRequest,
    model_registry: &Path,
    overrides: &ScoreOverrides,
) -> anyhow::Result<()> {
    section("Score");

    let config = overrides.resolve()?;
    let registry = LocalModelRegistry::open(model_registry)?;

    step_run(&format!(
        "Scoring {} with model {}",
        request.scoring_data.display(),
        request.model_name.cyan()
    ));
    let start = Instant::now();
    let report = ScoringJob::new(&registry, config).run(request)?;
    step_done(
        "Scored",
        &format!("{} rows in {:?}", report.rows_scored, start.elapsed()),
    );

    println!();
    println!("  {:<14} {} v{}", muted("Model"), report.model_name, report.model_version);
    println!("  {:<14} {}", muted("Background"), report.background_rows);
    println!("  {:<14} {:.6}", muted("Base value"), report.base_value);
    println!("  {:<14} {}", muted("Output"), report.output_path.display().to_string().white().bold());

    section("Attribution");
    println!("  {:<24} {:>12}", muted("Feature"), muted("Mean |SHAP|"));
    println!("  {}", dim(&"─".repeat(38)));
    for (feature, importance) in report.summary.feature_ranking() {
        println!("  {:<24} {:>12.6}", feature, importance);
    }
    println!();

    Ok(())
}
