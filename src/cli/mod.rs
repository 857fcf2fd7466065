// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `train`    — trains the Siamese network on drawings
//   2. `compare`  — scores two image files with a checkpoint
//   3. `evaluate` — N-way one-shot accuracy of a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, CompareArgs, EvaluateArgs, TrainArgs};

use crate::application::train_use_case::TrainConfig;

#[derive(Parser, Debug)]
#[command(
    name = "siamese-oneshot",
    version = "0.1.0",
    about = "Train a Siamese CNN on Omniglot drawings, then recognise characters from one example."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Compare(args)  => run_compare(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let base = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Cannot read config '{}'", path.display()))?;
            serde_json::from_str::<TrainConfig>(&json)
                .with_context(|| format!("Malformed config '{}'", path.display()))?
        }
        None => TrainConfig::default(),
    };
    let cfg = args.apply(base);

    tracing::info!("Starting training on drawings in: {}", cfg.train_dir);
    let report = TrainUseCase::new(cfg).execute()?;

    if report.interrupted {
        println!("Training interrupted. Weights saved at epoch {}.", report.last_epoch);
    } else {
        println!("Training complete. Checkpoint saved at epoch {}.", report.last_epoch);
    }
    if let Some(val) = report.last_validation {
        println!(
            "Final validation: loss={:.4} accuracy={:.1}%",
            val.loss,
            val.accuracy * 100.0
        );
    }
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    use crate::application::compare_use_case::CompareUseCase;

    let use_case = CompareUseCase::new(&args.checkpoint_dir, args.device.map(Into::into))?;
    let result   = use_case.compare(&args.first, &args.second)?;

    println!("\nSimilarity: {:.4}", result.similarity);
    println!(
        "Verdict:    {}",
        if result.same { "same character" } else { "different characters" }
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.into()).execute()?;

    println!(
        "\n{}-way one-shot accuracy: {:.1}% ({}/{} tasks, chance {:.1}%)",
        report.n_way,
        report.accuracy() * 100.0,
        report.correct,
        report.trials,
        report.chance() * 100.0
    );
    Ok(())
}
