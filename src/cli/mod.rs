// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to the use cases.
//
//   treepair train    --data-dir data/sick --model edge
//   treepair evaluate --split-dir data/sick/test

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "treepair",
    version,
    about = "Train and evaluate a Child-Sum Tree-LSTM on sentence pairs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on corpus: {}", args.data_dir);
    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: {} epochs, best dev loss {:.4} at epoch {}.",
        summary.epochs, summary.best_dev_loss, summary.best_epoch,
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.into()).execute()?;

    println!("Epoch:    {}", report.epoch);
    println!("Loss:     {:.4}", report.loss);
    println!("Accuracy: {:.2}%", report.scores.accuracy * 100.0);
    println!("Pearson:  {:.4}", report.scores.pearson);
    println!("MSE:      {:.4}", report.scores.mse);
    Ok(())
}
