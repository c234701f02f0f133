use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};

mod inspect;
mod run;

#[derive(Debug, Parser)]
#[command(version, about = "Adaptive quadtree stable-fluids solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scripted simulation and export every frame.
    Run(run::RunArgs),
    /// Print a per-frame summary of an export directory.
    Inspect {
        /// The export directory written by `run`.
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Inspect { path } => inspect::inspect(path),
    }
}
