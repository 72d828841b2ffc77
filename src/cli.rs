// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(about = "Push-based deployment over SSH using SCP or SFTP")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new skiff.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Deploy configured artifacts to the target
    Deploy {
        /// Path to the configuration file (default: discover in cwd)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Named destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },
}
