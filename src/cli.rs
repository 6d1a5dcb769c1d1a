//! Command-line interface for the flowgate binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "flowgate")]
#[command(about = "flowgate - tiered cache and session coordination gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway daemon
    Serve {
        /// Path to the configuration file (default: ~/.flowgate/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Display version information
    Version,
}

/// Executes the parsed command, returning the process exit code
pub fn run(cli: Cli) -> i32 {
    match cli.command {
        Some(Commands::Serve { config }) => serve(config),
        Some(Commands::Version) | None => {
            println!("flowgate {}", env!("CARGO_PKG_VERSION"));
            0
        }
    }
}

fn serve(config_path: Option<PathBuf>) -> i32 {
    let config = match crate::config::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            return 1;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(crate::gateway::run_gateway(&config)) {
        Ok(()) => 0,
        Err(e) => {
            error!("Gateway terminated with error: {:#}", e);
            1
        }
    }
}
