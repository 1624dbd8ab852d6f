//! Store configuration via `transient.toml`
//!
//! Mirrors the `strata.toml` model: a small TOML file whose missing fields
//! fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strata_core::{StrataError, StrataResult};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "transient.toml";

/// Transient store configuration.
///
/// # Example
///
/// ```toml
/// flush_retry_on_conflict = 3
/// retry_delay_ms = 0
/// warn_on_implicit_release = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransientStoreConfig {
    /// Extra attempts `transactional_with_retry` makes after a conflict.
    #[serde(default = "default_flush_retry_on_conflict")]
    pub flush_retry_on_conflict: usize,
    /// Pause between retry attempts in milliseconds.
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// Log a warning when an iterator or session is released by drop.
    #[serde(default = "default_warn_on_implicit_release")]
    pub warn_on_implicit_release: bool,
}

fn default_flush_retry_on_conflict() -> usize {
    3
}

fn default_warn_on_implicit_release() -> bool {
    true
}

impl Default for TransientStoreConfig {
    fn default() -> Self {
        Self {
            flush_retry_on_conflict: default_flush_retry_on_conflict(),
            retry_delay_ms: 0,
            warn_on_implicit_release: default_warn_on_implicit_release(),
        }
    }
}

impl TransientStoreConfig {
    /// Set the number of conflict retries
    pub fn with_flush_retry_on_conflict(mut self, retries: usize) -> Self {
        self.flush_retry_on_conflict = retries;
        self
    }

    /// Set the pause between retries
    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    /// Enable or disable implicit-release warnings
    pub fn with_warn_on_implicit_release(mut self, warn: bool) -> Self {
        self.warn_on_implicit_release = warn;
        self
    }

    /// Pause between retry attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Transient store configuration
#
# Retries made by transactional_with_retry when commit hits a conflict (default: 3)
flush_retry_on_conflict = 3

# Pause between retries in milliseconds (default: 0)
retry_delay_ms = 0

# Warn when an iterator or session is cleaned up by drop instead of
# an explicit dispose/commit/abort (default: true)
warn_on_implicit_release = true
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the text is not valid config TOML.
    pub fn from_toml_str(content: &str) -> StrataResult<Self> {
        toml::from_str(content)
            .map_err(|e| StrataError::invalid_input(format!("Failed to parse config: {}", e)))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            StrataError::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> StrataResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StrataError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
