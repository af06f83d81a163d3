//! The `contentking` provider module.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use seodeploy_core::{
    parse_module_config, run_diffs, ConvergencePoller, Environment, ModuleOutcome, Provider,
    Result, SamplePath, SeoConfig, Target,
};

use crate::client::{ContentKingClient, ContentKingNotifier, ContentKingStatus, IndexablePages};
use crate::config::ContentKingConfig;

pub const MODULE_NAME: &str = "contentking";

/// Diffs ContentKing's fresh crawl data for production and staging.
pub struct ContentKingProvider {
    config: ContentKingConfig,
    poller: ConvergencePoller,
}

impl ContentKingProvider {
    /// Build the provider from a validated config.
    pub fn new(config: ContentKingConfig, max_workers: usize) -> Result<Self> {
        config.ignore.validate()?;
        let client = ContentKingClient::new(config.api.clone())?;
        let notifier = Arc::new(ContentKingNotifier::new(client.clone()));

        let target = |environment, host: &str, site_id: &str| Target {
            environment,
            host: host.to_string(),
            notifier: notifier.clone(),
            status: Arc::new(ContentKingStatus::new(
                client.clone(),
                site_id,
                host,
                &config.time_col,
            )),
        };

        let poller = ConvergencePoller::new(
            target(Environment::Production, &config.prod_host, &config.prod_site_id),
            target(Environment::Staging, &config.stage_host, &config.stage_site_id),
            config.poll_settings(max_workers),
        );

        Ok(Self { config, poller })
    }

    /// Factory for [`seodeploy_core::ProviderRegistry`].
    pub fn from_table(table: &toml::Value, run: &SeoConfig) -> Result<Box<dyn Provider>> {
        let config: ContentKingConfig = parse_module_config(MODULE_NAME, table)?;
        let provider = Self::new(config.with_env_overrides(), run.max_workers)?;
        Ok(Box::new(provider))
    }

    pub fn config(&self) -> &ContentKingConfig {
        &self.config
    }

    /// Population of indexable production URLs, for sampling.
    pub fn population(&self) -> Result<IndexablePages> {
        let client = ContentKingClient::new(self.config.api.clone())?;
        Ok(IndexablePages::new(
            client,
            &self.config.prod_site_id,
            self.config.per_page,
        ))
    }
}

#[async_trait]
impl Provider for ContentKingProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    async fn run(&self, sample: &[SamplePath]) -> Result<ModuleOutcome> {
        let pairs = self.poller.run(sample).await?;
        let (diffs, errors) = run_diffs(&pairs, &self.config.ignore)?;
        info!(
            module = MODULE_NAME,
            paths = pairs.len(),
            diffs = diffs.len(),
            errors = errors.len(),
            "contentking comparison finished"
        );
        Ok(ModuleOutcome::from_diffs(MODULE_NAME, &diffs, errors))
    }
}
