// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates the work to Layer 2 (application).
//
//   1. `train`    — train on synthetic data, save checkpoint
//   2. `validate` — reload a checkpoint and score it again
//   3. `summary`  — describe a model without training it

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, SummaryArgs, TrainArgs, ValidateArgs};

#[derive(Parser, Debug)]
#[command(
    name = "trojan-lab",
    version,
    about = "Train, validate and inspect image classifiers for backdoor research."
)]
pub struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Validate(args) => run_validate(args),
            Commands::Summary(args)  => run_summary(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Training '{}' for {} epochs", args.model.model, args.epochs);
    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete. Baseline Acc@1: {:.3}  Best Acc@1: {:.3}  Checkpoints written: {}",
        report.baseline_acc, report.best_acc, report.checkpoints_written
    );
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    use crate::application::validate_use_case::ValidateUseCase;

    let result = ValidateUseCase::new(args.into()).execute()?;
    println!(
        "Loss: {:.4}  Acc@1: {:.3}  Acc@5: {:.3}",
        result.loss, result.top1, result.top5
    );
    Ok(())
}

fn run_summary(args: SummaryArgs) -> Result<()> {
    use crate::application::validate_use_case::SummaryUseCase;

    println!("{}", SummaryUseCase::new(args.into()).render()?);
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;

    #[test]
    fn test_train_flags_map_to_config() {
        let cli = Cli::parse_from([
            "trojan-lab", "train", "--model", "convnet2", "--epochs", "3", "--optim", "adam",
            "--no-lr-scheduler", "--no-save", "--randomized-smooth", "--rs-n", "4",
        ]);
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.model.name, "convnet2");
        assert_eq!(cfg.training.epochs, 3);
        assert!(!cfg.training.save);
        assert!(!cfg.optimizer.lr_scheduler);
        assert_eq!(cfg.optimizer.optim_type, "adam");
        assert!(cfg.model.randomized_smooth);
        assert_eq!(cfg.model.rs_n, 4);
    }

    #[test]
    fn test_global_verbose_flag() {
        let cli = Cli::parse_from(["trojan-lab", "summary", "--verbose", "--model", "mlp"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Summary(_)));
    }
}
