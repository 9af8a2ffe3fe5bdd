//! Kolosal Scoring - Main Entry Point
//!
//! Runs the preprocessing and scoring batch jobs.

use clap::Parser;
use kolosal_scoring::cli::{cmd_preprocess, cmd_score, Cli, Commands, ScoreOverrides};
use kolosal_scoring::pipeline::ScoringRequest;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_scoring=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preprocess {
            raw_dataset,
            preprocessed_train_data,
            preprocessed_test_data,
            test_size,
            seed,
        } => {
            cmd_preprocess(
                &raw_dataset,
                &preprocessed_train_data,
                &preprocessed_test_data,
                test_size,
                seed,
            )
            .inspect_err(|e| {
                tracing::error!(
                    raw_dataset = %raw_dataset.display(),
                    train = %preprocessed_train_data.display(),
                    test = %preprocessed_test_data.display(),
                    error = %e,
                    "Preprocessing failed"
                )
            })?;
        }
        Commands::Score {
            training_data,
            scoring_data,
            model_name,
            target_column,
            scored_data,
            model_registry,
            config,
            background_size,
            n_permutations,
            seed,
            threads,
        } => {
            let request = ScoringRequest {
                training_data,
                scoring_data,
                model_name,
                target_column,
                scored_data,
            };
            let overrides = ScoreOverrides {
                config,
                background_size,
                n_permutations,
                seed,
                threads,
            };
            cmd_score(&request, &model_registry, &overrides).inspect_err(|e| {
                tracing::error!(
                    training_data = %request.training_data.display(),
                    scoring_data = %request.scoring_data.display(),
                    model = %request.model_name,
                    registry = %model_registry.display(),
                    error = %e,
                    "Scoring failed"
                )
            })?;
        }
    }

    Ok(())
}
