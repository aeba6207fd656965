//! Meshbroker CLI - Command-line interface
//!
//! This binary provides a command-line interface to the meshbroker
//! library: `serve` runs a broker, `worker` runs a simple echo worker
//! (the factory's default spawn target and a handy test peer).

mod commands;
mod error;

use clap::{Parser, Subcommand};
use error::CliError;

#[derive(Parser)]
#[command(name = "meshbroker")]
#[command(version = meshbroker::VERSION)]
#[command(about = "Dispatch brokering for distributed mesh generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a broker until interrupted
    Serve(commands::serve::ServeArgs),

    /// Run an echo worker against a broker's worker endpoint
    Worker(commands::worker::WorkerArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = meshbroker::logging::init_logging() {
        CliError::LoggingInit(e.to_string()).exit();
    }

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Worker(args) => commands::worker::run(args).await,
    };

    if let Err(e) = outcome {
        e.exit();
    }
}
