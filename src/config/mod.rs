//! Engine configuration
//!
//! Settings that shape how a [`Graph`](crate::graph::Graph) behaves at
//! runtime. They are stored as TOML so they can be edited by hand.
//!
//! # Location
//!
//! The default file lives in the platform configuration directory:
//! - **Linux**: `~/.config/treeflow/engine.toml`
//! - **macOS**: `~/Library/Application Support/treeflow/engine.toml`
//! - **Windows**: `%APPDATA%\treeflow\engine.toml`
//!
//! Set `TREEFLOW_CONFIG` to point somewhere else.
//!
//! # Example
//!
//! ```toml
//! stale_results = "discard"
//! log_filter = "info,treeflow=debug"
//!
//! [script]
//! max_operations = 10000
//! ```

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
pub const APP_DIR: &str = "treeflow";

/// Config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Environment variable overriding the config location
pub const CONFIG_ENV: &str = "TREEFLOW_CONFIG";

/// Default tracing filter for the binary
pub const DEFAULT_LOG_FILTER: &str = "info,treeflow=debug";

/// What to do with results of a deferred calculation that a newer
/// calculation of the same component has overtaken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaleResultPolicy {
    #[default]
    Discard,
    Apply,
}

/// Safety limits for the Rhai engine used by script components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptLimits {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,
}

fn default_max_operations() -> u64 {
    10_000
}

fn default_max_call_levels() -> usize {
    32
}

fn default_max_string_size() -> usize {
    10_000
}

fn default_max_array_size() -> usize {
    1_000
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
            max_array_size: default_max_array_size(),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub stale_results: StaleResultPolicy,

    #[serde(default)]
    pub script: ScriptLimits,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Write logs to this file in addition to stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stale_results: StaleResultPolicy::default(),
            script: ScriptLimits::default(),
            log_filter: default_log_filter(),
            log_file: None,
        }
    }
}

/// Path of the engine config, honouring `TREEFLOW_CONFIG`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
}

impl EngineConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FlowError::Config(format!("Failed to read {:?}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| FlowError::Config(format!("Failed to parse {:?}: {}", path, e)))
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| FlowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| FlowError::Config(format!("Failed to write {:?}: {}", path, e)))?;
        tracing::debug!("Saved engine config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.stale_results, StaleResultPolicy::Discard);
        assert_eq!(config.script.max_operations, 10_000);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
stale_results = "apply"

[script]
max_call_levels = 8
"#,
        )
        .unwrap();
        assert_eq!(config.stale_results, StaleResultPolicy::Apply);
        assert_eq!(config.script.max_call_levels, 8);
        assert_eq!(config.script.max_array_size, 1_000);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = EngineConfig::default();
        config.log_file = Some(PathBuf::from("/tmp/treeflow.log"));
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "stale_results = 12").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(FlowError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "log_filter = \"warn\"").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        assert_eq!(default_config_path(), Some(path.clone()));
        let config = EngineConfig::load_or_default();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(config.log_filter, "warn");
    }
}
