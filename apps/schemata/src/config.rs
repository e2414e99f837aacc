//! # Application Configuration
//!
//! Optional `schemata.toml` next to the script, overridden by environment.
//!
//! ```toml
//! default_source = "explicit"
//! remove_unreachable = true
//! fail_on_outranked = false
//! ```

use crate::error::AppError;
use schemata_core::Provenance;
use serde::Deserialize;
use std::path::Path;

/// Maximum accepted configuration file size.
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Overrides `default_source`.
pub const ENV_DEFAULT_SOURCE: &str = "SCHEMATA_DEFAULT_SOURCE";
/// Overrides `remove_unreachable`.
pub const ENV_REMOVE_UNREACHABLE: &str = "SCHEMATA_REMOVE_UNREACHABLE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Provenance for directives that do not name one.
    pub default_source: Provenance,
    /// Run the cleanup checkpoint before finalizing.
    pub remove_unreachable: bool,
    /// Treat outranked directives as errors.
    pub fail_on_outranked: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_source: Provenance::Explicit,
            remove_unreachable: true,
            fail_on_outranked: false,
        }
    }
}

impl AppConfig {
    /// Load from `path` (defaults when missing), then apply the environment.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut config = if path.exists() {
            let size = std::fs::metadata(path)
                .map_err(|e| AppError::io(path, e))?
                .len();
            if size > MAX_CONFIG_FILE_SIZE {
                return Err(AppError::Config(format!(
                    "'{}' is {} bytes, maximum is {}",
                    path.display(),
                    size,
                    MAX_CONFIG_FILE_SIZE
                )));
            }
            let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
            Self::from_toml(&text)?
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Self::default()
        };
        config.apply_overrides(
            std::env::var(ENV_DEFAULT_SOURCE).ok().as_deref(),
            std::env::var(ENV_REMOVE_UNREACHABLE).ok().as_deref(),
        )?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Apply environment-style overrides.
    pub fn apply_overrides(
        &mut self,
        default_source: Option<&str>,
        remove_unreachable: Option<&str>,
    ) -> Result<(), AppError> {
        if let Some(value) = default_source {
            self.default_source = value
                .parse()
                .map_err(|e| AppError::Config(format!("{}: {}", ENV_DEFAULT_SOURCE, e)))?;
        }
        if let Some(value) = remove_unreachable {
            self.remove_unreachable = parse_flag(value).ok_or_else(|| {
                AppError::Config(format!(
                    "{}: expected true/false, got '{}'",
                    ENV_REMOVE_UNREACHABLE, value
                ))
            })?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
