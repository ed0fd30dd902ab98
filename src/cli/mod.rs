// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and routes each subcommand
// to its use case in Layer 2.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ConvertArgs};

use crate::domain::run_config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "ghostnoise",
    version,
    about = "Train image classifiers with full-batch gradient descent and diagonal-Fisher gradient noise."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Gd(args)          => run_train(args.into()),
            Commands::Fisher(args)      => run_train(args.into()),
            Commands::ConvertSvhn(args) => run_convert(args),
        }
    }
}

fn run_train(config: RunConfig) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!(
        "Training {} ({}) on '{}', logging to '{}'",
        config.model,
        if config.is_noisy() { "fisher noise" } else { "plain gd" },
        config.data_dir.display(),
        config.log_dir.display()
    );
    TrainUseCase::new(config).execute()?;

    println!("Training complete.");
    Ok(())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    use crate::application::convert_use_case::ConvertUseCase;

    let written = ConvertUseCase::new(args.into()).execute()?;
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
