//! Provider modules and their registry.
//!
//! A provider acquires production/staging page data for the sample by its
//! own strategy (crawl-status polling, direct rendering) and diffs it. The
//! registry maps module names to factories; a module is activated by the
//! presence of its `[modules.<name>]` table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use crate::config::SeoConfig;
use crate::domain::{DiffRecord, Message, PathError, Result, SamplePath, SeoError};

/// Result of running one provider module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    pub module: String,
    pub messages: Vec<Message>,
    pub errors: Vec<PathError>,
    pub passing: bool,
}

impl ModuleOutcome {
    /// Build an outcome from raw diffs. The module passes iff there are no
    /// messages; per-path errors do not fail it.
    pub fn from_diffs(module: &str, diffs: &[DiffRecord], errors: Vec<PathError>) -> Self {
        let messages = prepare_messages(module, diffs);
        let passing = messages.is_empty();
        Self {
            module: module.to_string(),
            messages,
            errors,
            passing,
        }
    }
}

/// Stringify diff records into report messages tagged with `module`.
pub fn prepare_messages(module: &str, diffs: &[DiffRecord]) -> Vec<Message> {
    diffs.iter().map(|d| Message::from_diff(module, d)).collect()
}

/// A named provider module.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire data for `sample` in both environments and diff it.
    ///
    /// Per-path problems are returned in the outcome's error list; an `Err`
    /// aborts the whole run.
    async fn run(&self, sample: &[SamplePath]) -> Result<ModuleOutcome>;
}

/// Builds a provider from its module table and the run configuration.
pub type ProviderFactory =
    Box<dyn Fn(&toml::Value, &SeoConfig) -> Result<Box<dyn Provider>> + Send + Sync>;

/// Explicit name -> factory table, populated at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&toml::Value, &SeoConfig) -> Result<Box<dyn Provider>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate every module with a table in `config`, in key order.
    pub fn activate(&self, config: &SeoConfig) -> Result<Vec<Box<dyn Provider>>> {
        config
            .modules
            .iter()
            .map(|(name, table)| {
                let factory = self.factories.get(name).ok_or_else(|| {
                    SeoError::Config(format!(
                        "unknown module `{name}` (available: {})",
                        self.names().join(", ")
                    ))
                })?;
                debug!(module = %name, "activating module");
                factory(table, config)
            })
            .collect()
    }
}
