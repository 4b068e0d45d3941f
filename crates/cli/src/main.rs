//! Shopgrid CLI - tenancy migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply tenancy schema migrations
//! shopgrid-cli migrate
//!
//! # Validate a tenancy config document
//! shopgrid-cli config check crates/tenancy/config/tenancy.yaml
//!
//! # Ask the rule engine where a tenant with these numbers belongs
//! shopgrid-cli recommend --customers 12000 --orders 4000 --current schema
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run tenancy database migrations
//! - `config check` - Load and validate a tenancy YAML document
//! - `recommend` - Evaluate migration thresholds offline

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopgrid-cli")]
#[command(author, version, about = "Shopgrid tenancy CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tenancy database migrations
    Migrate,
    /// Work with tenancy config documents
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Evaluate the migration rules for a set of usage numbers
    Recommend(commands::recommend::RecommendArgs),
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate a tenancy YAML document
    Check {
        /// Path to the document
        #[arg(default_value = "config/tenancy.yaml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::tenancy().await?,
        Commands::Config { action } => match action {
            ConfigAction::Check { path } => commands::config::check(&path)?,
        },
        Commands::Recommend(args) => {
            let report = commands::recommend::run(&args)?;
            #[allow(clippy::print_stdout)]
            {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(())
}
