//! Configuration file support for dosecalc.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/dosecalc/config.toml`.

use crate::registry::DEFAULT_MAX_DELEGATION_DEPTH;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub records: RecordsConfig,
}

/// Rule table location and dispatch limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Directory holding one `<order set>.csv` per order set
    #[serde(default = "default_rules_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_max_delegation_depth")]
    pub max_delegation_depth: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: default_rules_dir(),
            max_delegation_depth: default_max_delegation_depth(),
        }
    }
}

/// Clinical records file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default = "default_records_path")]
    pub path: PathBuf,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: default_records_path(),
        }
    }
}

// Default value functions
fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dosecalc")
}

fn default_rules_dir() -> PathBuf {
    data_dir().join("drugorderrules")
}

fn default_records_path() -> PathBuf {
    data_dir().join("records.json")
}

fn default_max_delegation_depth() -> usize {
    DEFAULT_MAX_DELEGATION_DEPTH
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dosecalc")
            .join("config.toml")
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rules.max_delegation_depth == 0 {
            return Err(Error::Config(
                "rules.max_delegation_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Save the configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
