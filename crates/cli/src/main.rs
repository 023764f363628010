//! Switchyard CLI — the main entry point.
//!
//! Commands:
//! - `models`   — List the registered model catalog
//! - `resolve`  — Show which models satisfy a requirement, cheapest first
//! - `chat`     — Interactive or single-message chat

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "Switchyard: capability-routed model turns",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.switchyard/config.toml
    #[arg(short, long, global = true, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every model in the catalog
    Models,

    /// Rank the models matching a requirement
    Resolve {
        /// A model name or `provider:key<op>value,...`
        query: String,
    },

    /// Chat through the turn orchestrator
    Chat {
        /// Model requirement (defaults to `default_model` from config)
        #[arg(long)]
        model: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Models => commands::models::run(&config).await?,
        Commands::Resolve { query } => commands::resolve::run(&config, &query).await?,
        Commands::Chat { model, message } => commands::chat::run(&config, model, message).await?,
    }

    Ok(())
}
