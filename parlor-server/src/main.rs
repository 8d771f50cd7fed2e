//! Main entry point for the parlor server CLI.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::server::Config;
use std::path::PathBuf;

/// Main CLI structure for the parlor server.
#[derive(Parser)]
#[command(name = "parlor")]
#[command(about = "Long-poll chat room server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for the parlor CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// The port number to bind the server to (e.g., 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to the configuration file (YAML or JSON); defaults apply
        /// when omitted
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

async fn handle_serve_command(port: Option<u16>, config: Option<PathBuf>) -> anyhow::Result<()> {
    let resolved = Config::load(config, port)?;
    server::server::run(resolved).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => handle_serve_command(port, config).await,
    }
}
