//! # Schemata CLI Module
//!
//! This module implements the CLI interface for Schemata.
//!
//! ## Available Commands
//!
//! - `build` - Replay a model script, finalize, write the snapshot
//! - `check` - Replay a model script and report whether it finalizes
//! - `inspect` - Describe a snapshot or persisted model file

mod commands;

use crate::config::AppConfig;
use crate::error::AppError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Schemata - provenance-governed schema model builder
///
/// Replays configuration directives from conventions, annotations and
/// explicit calls into one consistent, finalized model.
#[derive(Parser, Debug)]
#[command(name = "schemata")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "schemata.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Binary layout written by `build`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Flattened, checksummed model snapshot
    Snapshot,
    /// Full model state, reloadable with every provenance
    Model,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a finalized model from a script
    Build {
        /// Path to the model script (TOML)
        #[arg(short, long)]
        script: PathBuf,

        /// Output file path (omit to only print)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output layout
        #[arg(short = 't', long, value_enum, default_value = "snapshot")]
        format: OutputFormat,
    },

    /// Check that a script produces a valid model
    Check {
        /// Path to the model script (TOML)
        #[arg(short, long)]
        script: PathBuf,
    },

    /// Describe a snapshot or model file
    Inspect {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), AppError> {
    let output = Output {
        json_mode: cli.json_mode,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Build {
            script,
            output: target,
            format,
        } => {
            let config = AppConfig::load(&cli.config)?;
            cmd_build(&config, output, &script, target.as_deref(), format)
        }
        Commands::Check { script } => {
            let config = AppConfig::load(&cli.config)?;
            cmd_check(&config, output, &script)
        }
        Commands::Inspect { input } => cmd_inspect(output, &input),
    }
}
