//! Configuration file support for the CLI.
//!
//! Loads and saves the lockscope configuration from TOML files.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lockscope_common::config::LockscopeConfig;
use serde::{Deserialize, Serialize};

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default output format.
    #[serde(default = "default_format")]
    pub output_format: String,

    /// Lock manager and diagnostics settings.
    #[serde(flatten)]
    pub engine: LockscopeConfig,
}

fn default_format() -> String {
    "table".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_format: default_format(),
            engine: LockscopeConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to encode config")
    }

    /// Validates the engine settings.
    pub fn validate(&self) -> Result<()> {
        self.engine
            .validate()
            .map_err(|message| anyhow!("invalid configuration: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert_eq!(config.output_format, "table");
        assert_eq!(config.engine, LockscopeConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lockscope.toml");

        let mut config = CliConfig::default();
        config.output_format = "json".to_string();
        config.engine.lock.wait_timeout_ms = Some(250);
        config.engine.diagnostics.response_limit_bytes = 4096;
        config.save(&path).unwrap();

        let loaded = CliConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lockscope.toml");
        std::fs::write(&path, "[diagnostics]\nresponse_limit_bytes = 1024\n").unwrap();

        let loaded = CliConfig::from_file(&path).unwrap();
        assert_eq!(loaded.output_format, "table");
        assert_eq!(loaded.engine.diagnostics.response_limit_bytes, 1024);
        assert_eq!(loaded.engine.lock, LockscopeConfig::default().lock);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lockscope.toml");
        std::fs::write(&path, "[lock]\nshards = 3\n").unwrap();

        let err = CliConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("shards"));

        let missing = dir.path().join("missing.toml");
        assert!(CliConfig::from_file(&missing).is_err());
    }
}
