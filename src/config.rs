//! Splitter and bridge configuration
//!
//! Loaded from `<config_dir>/midisplit/config.json`. Every field has a
//! default, so a partial (or missing) file is fine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What to do with sounding notes when a reset event arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Drop all bookkeeping and forward the reset event only
    #[default]
    Silent,
    /// Forward a note off for every active translation before the reset event
    ReleaseActive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Log every channel assignment decision
    pub trace: bool,
    pub reset_policy: ResetPolicy,
    /// Capacity of the worker queue between the input port and the splitter
    pub queue_capacity: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            trace: false,
            reset_policy: ResetPolicy::Silent,
            queue_capacity: 1024,
        }
    }
}

/// Settings for the `midisplit run` bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Input port, by index or name fragment. `None` picks the first port.
    pub input: Option<String>,
    /// Output port, by index or name fragment. `None` picks the first port.
    pub output: Option<String>,
    /// Route through the splitter (false forwards input straight to output)
    pub split: bool,
    pub splitter: SplitterConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            split: true,
            splitter: SplitterConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("midisplit")
            .join("config.json")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{ "output": "Moppy", "splitter": { "trace": true } }"#)
                .unwrap();
        assert_eq!(config.output.as_deref(), Some("Moppy"));
        assert!(config.split);
        assert!(config.splitter.trace);
        assert_eq!(config.splitter.reset_policy, ResetPolicy::Silent);
        assert_eq!(config.splitter.queue_capacity, 1024);
    }

    #[test]
    fn test_reset_policy_names() {
        let config: SplitterConfig =
            serde_json::from_str(r#"{ "reset_policy": "release_active" }"#).unwrap();
        assert_eq!(config.reset_policy, ResetPolicy::ReleaseActive);
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("midisplit-no-such-config.json");
        let config = BridgeConfig::load_or_default(&path).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let path = std::env::temp_dir().join(format!("midisplit-bad-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let result = BridgeConfig::load(&path);
        let _ = fs::remove_file(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
