//! relaybot - Telegram relay for a git workspace.

use clap::Parser;
use std::process::ExitCode;

use relaybot::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // The guard flushes the file writer; keep it until exit.
    let _guard = match logging::init() {
        Ok((guard, dir)) => {
            tracing::debug!("Logging to {}", dir.display());
            guard
        }
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
