// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`       → trains a detector (optionally resuming)
//   2. `checkpoints` → lists a run's saved checkpoints
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CheckpointsArgs, Commands, TrainArgs};

use crate::domain::selector::ModelKind;

/// The main CLI struct; clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "leitmotif-trainer",
    version = "0.1.0",
    about = "Train leitmotif detectors with auxiliary singing/version heads."
)]
pub struct Cli {
    /// The subcommand to run (train or checkpoints)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)       => run_train(args),
            Commands::Checkpoints(args) => run_checkpoints(args),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let config = args.resolve()?;
    tracing::info!(
        "Starting run '{}': {} model, split by {}",
        config.run_name,
        config.model,
        config.split
    );

    let report = TrainUseCase::new(config)?.execute()?;

    match (report.validation.last(), report.checkpoints.last()) {
        (Some(summary), Some(path)) => println!(
            "Training complete. valid_f1={:.3}, last checkpoint: {}",
            summary.f1,
            path.display()
        ),
        _ => println!("Training complete. No epochs left to run."),
    }
    Ok(())
}

/// Handles the `checkpoints` subcommand.
fn run_checkpoints(args: CheckpointsArgs) -> Result<()> {
    use crate::application::checkpoints_use_case::CheckpointsUseCase;

    let model: ModelKind = args.model.parse()?;
    let found = CheckpointsUseCase::new(&args.checkpoint_dir).list(model, &args.run_name)?;

    if found.is_empty() {
        println!("No checkpoints for {}/{}", model, args.run_name);
    }
    for (epoch, path) in found {
        println!("epoch {:>4}  {}", epoch, path.display());
    }
    Ok(())
}
