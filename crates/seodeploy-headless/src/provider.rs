//! The `headless` provider module.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use seodeploy_core::{
    group_batcher, join_url, obs, pair_records, parallel_map, parse_module_config, run_diffs,
    ConvergenceRecord, Environment, ModuleOutcome, Provider, Result, SamplePath, SeoConfig,
    SeoError,
};

use crate::config::HeadlessConfig;
use crate::render::{render_with_retry, Renderer, StaticHtmlRenderer};

pub const MODULE_NAME: &str = "headless";

/// Renders every sampled path in both environments and diffs the content.
pub struct HeadlessProvider {
    config: HeadlessConfig,
    renderer: Arc<dyn Renderer>,
    max_workers: usize,
}

impl HeadlessProvider {
    pub fn new(config: HeadlessConfig, renderer: Arc<dyn Renderer>, max_workers: usize) -> Result<Self> {
        config.ignore.validate()?;
        Ok(Self {
            config,
            renderer,
            max_workers: max_workers.max(1),
        })
    }

    /// Factory for [`seodeploy_core::ProviderRegistry`].
    pub fn from_table(table: &toml::Value, run: &SeoConfig) -> Result<Box<dyn Provider>> {
        let config: HeadlessConfig = parse_module_config(MODULE_NAME, table)?;
        let renderer = StaticHtmlRenderer::new(&config)
            .map_err(|e| SeoError::Config(format!("[modules.{MODULE_NAME}]: {e}")))?;
        let provider = Self::new(config, Arc::new(renderer), run.max_workers)?;
        Ok(Box::new(provider))
    }

    pub fn config(&self) -> &HeadlessConfig {
        &self.config
    }

    async fn render_environment(
        &self,
        environment: Environment,
        batch: Vec<SamplePath>,
    ) -> Result<Vec<ConvergenceRecord>> {
        let host = match environment {
            Environment::Production => self.config.prod_host.clone(),
            Environment::Staging => self.config.stage_host.clone(),
        };
        let renderer = Arc::clone(&self.renderer);
        let attempts = self.config.render_attempts;

        parallel_map(batch, self.max_workers, move |shard: Vec<SamplePath>| {
            let renderer = Arc::clone(&renderer);
            let host = host.clone();
            async move {
                let mut records = Vec::with_capacity(shard.len());
                for path in shard {
                    let url = join_url(&host, path.as_str());
                    let record = match render_with_retry(renderer.as_ref(), &url, attempts).await {
                        Ok(snapshot) => ConvergenceRecord::resolved(path, snapshot),
                        Err(e) => ConvergenceRecord::invalid(path, e),
                    };
                    records.push(record);
                }
                Ok(records)
            }
        })
        .await
    }
}

#[async_trait]
impl Provider for HeadlessProvider {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    async fn run(&self, sample: &[SamplePath]) -> Result<ModuleOutcome> {
        let batches = group_batcher(sample, self.config.batch_size.max(1), None);
        let mut prod_records = Vec::with_capacity(sample.len());
        let mut stage_records = Vec::with_capacity(sample.len());

        for (index, batch) in batches.iter().enumerate() {
            let (prod, stage) = futures::try_join!(
                self.render_environment(Environment::Production, batch.clone()),
                self.render_environment(Environment::Staging, batch.clone()),
            )?;
            prod_records.extend(prod);
            stage_records.extend(stage);
            obs::emit_batch_finished(index + 1, batches.len(), batch.len());
        }

        let pairs = pair_records(sample, prod_records, stage_records);
        let (diffs, errors) = run_diffs(&pairs, &self.config.ignore)?;
        info!(
            module = MODULE_NAME,
            paths = pairs.len(),
            diffs = diffs.len(),
            errors = errors.len(),
            "headless comparison finished"
        );
        Ok(ModuleOutcome::from_diffs(MODULE_NAME, &diffs, errors))
    }
}
