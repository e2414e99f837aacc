//! # schemata
//!
//! Command-line front-end for the Schemata schema kernel.
//!
//! A model script is replayed directive by directive through the
//! configuration facade of [`schemata_core::Model`], optionally cleaned up,
//! finalized, and written out as a snapshot or a full model file.

pub mod cli;
pub mod config;
pub mod error;
pub mod script;

pub use config::AppConfig;
pub use error::AppError;
pub use script::{Directive, DirectiveEntry, ModelScript, ScriptReport};
