// ABOUTME: Entry point for the skiff CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use skiff::config::{self, Config};
use skiff::credential::{DirKeyStore, KeyStore, NoKeys};
use skiff::error::Result;
use skiff::output::{OutputMode, render_report};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match run(cli).await {
        Ok(success) => {
            if !success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            println!("Created {}", config::CONFIG_FILENAME);
            Ok(true)
        }
        Commands::Deploy {
            config: config_path,
            destination,
            json,
        } => {
            let config = load_config(config_path)?;

            // Apply destination overrides if specified
            let config = if let Some(dest) = destination {
                config.for_destination(&dest)?
            } else {
                config
            };

            let keys: Box<dyn KeyStore> = match &config.keys_dir {
                Some(dir) => Box::new(DirKeyStore::new(dir)),
                None => Box::new(NoKeys),
            };

            let report = skiff::deploy::run(&config, keys.as_ref()).await;

            let mode = if json {
                OutputMode::Json
            } else {
                OutputMode::Normal
            };
            print!("{}", render_report(&report, mode));

            Ok(report.success())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path),
        None => {
            let cwd = env::current_dir()?;
            Config::discover(&cwd)
        }
    }
}
