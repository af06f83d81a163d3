//! Configuration loading from `seodeploy.toml`.
//!
//! The file is parsed once into typed records. Each `[modules.<name>]`
//! table activates that provider module; its contents are handed to the
//! provider's factory, which parses them into its own config struct.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{Result, SeoError};
use crate::sampling::Z_SCORES;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "seodeploy.toml";

/// Top-level SEODeploy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeoConfig {
    /// Where the sample paths are persisted and reloaded from.
    pub samples_filename: PathBuf,
    pub confidence_level: f64,
    pub confidence_interval: f64,
    /// Stop population discovery after this many urls.
    pub url_limit: Option<usize>,
    pub max_workers: usize,
    pub output_csv: PathBuf,
    /// Module name -> raw module table.
    pub modules: BTreeMap<String, toml::Value>,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            samples_filename: PathBuf::from("path_samples.txt"),
            confidence_level: 95.0,
            confidence_interval: 5.0,
            url_limit: None,
            max_workers: 1,
            output_csv: PathBuf::from("output.csv"),
            modules: BTreeMap::new(),
        }
    }
}

impl SeoConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !Z_SCORES
            .iter()
            .any(|(level, _)| (level - self.confidence_level).abs() < f64::EPSILON)
        {
            return Err(SeoError::Config(format!(
                "confidence_level must be one of 50, 68, 90, 95, 99 (got {})",
                self.confidence_level
            )));
        }
        if !(self.confidence_interval > 0.0 && self.confidence_interval <= 100.0) {
            return Err(SeoError::Config(format!(
                "confidence_interval must be in (0, 100] (got {})",
                self.confidence_interval
            )));
        }
        if self.max_workers == 0 {
            return Err(SeoError::Config("max_workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Names of the activated modules, in key order.
    pub fn active_modules(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

/// Parse one module's table into its typed config.
pub fn parse_module_config<T: DeserializeOwned>(module: &str, table: &toml::Value) -> Result<T> {
    table
        .clone()
        .try_into()
        .map_err(|e| SeoError::Config(format!("[modules.{module}]: {e}")))
}

/// Read an environment variable, treating empty values as unset.
pub fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
