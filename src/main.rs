//! Confluence Engine - multi-signal trade decision CLI
//!
//! Reads detector outputs and market context, prints a BUY/SELL/WAIT decision
//! with grade, manipulation assessment and timing window.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use confluence_engine::cli::commands;
use confluence_engine::config::Config;

/// Confluence Engine - multi-signal trade decisions
#[derive(Parser)]
#[command(name = "confluence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml", env = "CONFLUENCE_CONFIG")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one analysis request
    Evaluate {
        /// Request file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Session id (default: "cli")
        #[arg(short, long)]
        session: Option<String>,

        /// Bias state file, read before and written after the evaluation
        #[arg(long)]
        bias: Option<PathBuf>,
    },

    /// Replay a JSON-lines file of requests through one session
    Replay {
        /// Request file (one JSON request per line)
        #[arg(short, long)]
        input: PathBuf,

        /// Session id (default: "cli")
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

fn init_tracing(config: &Config, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    // Logs go to stderr so reports on stdout stay machine-readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_file(true).with_line_number(true).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    init_tracing(&config, cli.json_logs || config.logging.json);

    // Execute command
    let result = match cli.command {
        Commands::Evaluate {
            input,
            session,
            bias,
        } => commands::evaluate(&config, &input, session.as_deref(), bias.as_deref()).await,
        Commands::Replay { input, session } => {
            commands::replay(&config, &input, session.as_deref()).await
        }
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
