//! # Schemata
//!
//! The binary for the Schemata model builder.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a script and write the finalized snapshot
//! schemata build -s model.toml -o model.snap
//!
//! # Validate a script, machine-readable
//! schemata --json-mode check -s model.toml
//!
//! # Describe a written file
//! schemata inspect -i model.snap
//! ```

use clap::Parser;
use schemata::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // SCHEMATA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SCHEMATA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "schemata=info".into());

    // Logs go to stderr so JSON output on stdout stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!(kind = e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}
