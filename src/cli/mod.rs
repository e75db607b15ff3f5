// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — fits and grid-searches a model on the CSV tables
//   2. `predict` — loads the promoted artifact and serves a forecast
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "sales-forecast",
    version = "0.1.0",
    about = "Train a weekly retail sales forecasting model, then serve forecasts."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match &self.command {
            Commands::Train(args)   => self.run_train(args.clone()),
            Commands::Predict(args) => self.run_predict(args.clone()),
        }
    }

    /// Handles the `train` subcommand.
    /// Converts CLI args into a TrainConfig and hands off to Layer 2.
    fn run_train(&self, args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;
        use crate::ml::trainer::TrainOutcome;

        tracing::info!("Starting training from: {}", args.sales);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = TrainUseCase::new(args.into());
        match use_case.execute()? {
            TrainOutcome::Accepted { params, scores, .. } => {
                println!("Training complete. Artifact promoted.");
                println!("  params: {params}");
                println!("  scores: {scores}");
            }
            TrainOutcome::Rejected { best_params, scores } => {
                println!("Training finished, but no model met the quality gate.");
                println!("  best cell: {best_params}");
                println!("  scores:    {scores}");
            }
        }
        Ok(())
    }

    /// Handles the `predict` subcommand.
    /// Builds one raw record from the flags and prints the forecast.
    fn run_predict(&self, args: PredictArgs) -> Result<()> {
        use crate::application::predict_use_case::PredictUseCase;
        use crate::domain::record::RawRecord;

        // Load the promoted preprocessor/model pair
        let use_case = PredictUseCase::new(args.config())?;

        // Run the record through the frozen pipeline and print the result
        let record = RawRecord::from(&args);
        let forecast = use_case.predict(&record)?;
        println!(
            "\nForecast for store {} dept {} on {}: {:.2}",
            args.store, args.dept, args.date, forecast
        );
        Ok(())
    }
}
