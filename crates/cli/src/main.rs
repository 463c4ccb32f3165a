//! Weave CLI — the main entry point.
//!
//! Commands:
//! - `build`    — Assemble a context from a request document
//! - `tokenize` — Show token ids for a piece of text
//! - `config`   — Show, locate or validate configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "weave",
    about = "Weave — token-budgeted context assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a context from a request document (.toml or .json)
    Build {
        request: PathBuf,

        /// Override the token ceiling
        #[arg(short, long)]
        max_tokens: Option<i64>,

        /// Override the turn index
        #[arg(short, long)]
        turn: Option<u32>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show token ids for a piece of text
    Tokenize {
        text: String,

        /// Encoder to use instead of the configured one
        #[arg(short, long, env = "WEAVE_ENCODER")]
        encoder: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Default,
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            request,
            max_tokens,
            turn,
            json,
        } => commands::build::run(request, max_tokens, turn, json).await?,
        Commands::Tokenize { text, encoder } => commands::tokenize::run(text, encoder).await?,
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::default().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}
