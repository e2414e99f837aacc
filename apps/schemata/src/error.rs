//! # Application Errors
//!
//! Everything the binary can fail with. Kernel violations are wrapped
//! unchanged so their taxonomy key survives to the JSON output.

use schemata_core::SchemaError;
use std::path::PathBuf;

/// Errors surfaced by the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error on '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid model script: {0}")]
    Script(String),

    #[error("Directive #{index} ({op}): {source}")]
    Directive {
        index: usize,
        op: &'static str,
        source: SchemaError,
    },

    #[error("Directive #{index} ({op}) was outranked by an existing configuration")]
    Outranked { index: usize, op: &'static str },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Output error: {0}")]
    Output(String),
}

impl AppError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        AppError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Stable key for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Io { .. } => "io",
            AppError::Config(_) => "config",
            AppError::Script(_) => "script",
            AppError::Directive { source, .. } => source.kind().as_str(),
            AppError::Outranked { .. } => "outranked",
            AppError::Schema(err) => err.kind().as_str(),
            AppError::Output(_) => "output",
        }
    }
}
