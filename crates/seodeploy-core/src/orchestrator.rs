//! Run pipeline: sample, run each activated module, aggregate.
//!
//! Modules run sequentially. A module returning `Err` aborts the run
//! (fail-fast); per-path errors inside a module are only recorded.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::config::SeoConfig;
use crate::domain::{Message, Result, SamplePath};
use crate::module::{ModuleOutcome, Provider, ProviderRegistry};
use crate::obs;
use crate::reporting::{ModuleSummary, RunSummary};
use crate::sampling::{PopulationSource, Sampler};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Messages of all modules, in module order.
    pub messages: Vec<Message>,
    pub outcomes: Vec<ModuleOutcome>,
}

pub struct Orchestrator {
    sampler: Sampler,
    providers: Vec<Box<dyn Provider>>,
}

impl Orchestrator {
    pub fn new(sampler: Sampler, providers: Vec<Box<dyn Provider>>) -> Self {
        Self { sampler, providers }
    }

    /// Build the sampler from `config` and activate its modules.
    pub fn from_config(config: &SeoConfig, registry: &ProviderRegistry) -> Result<Self> {
        let sampler = Sampler::new(
            config.samples_filename.clone(),
            config.confidence_level,
            config.confidence_interval,
        )
        .with_limit(config.url_limit);
        let providers = registry.activate(config)?;
        Ok(Self::new(sampler, providers))
    }

    pub fn module_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Obtain the sample (reusing an existing sample file) and run every
    /// module against it.
    pub async fn run(&self, source: Option<&dyn PopulationSource>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = obs::run_span(&run_id.to_string());

        async {
            let result = async {
                let sample = self.sampler.get_sample_paths(source).await?;
                self.execute(run_id, &sample).await
            }
            .await;

            if let Err(e) = &result {
                obs::emit_run_fatal(&run_id.to_string(), e);
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Run every module against an already chosen sample.
    pub async fn execute(&self, run_id: Uuid, sample: &[SamplePath]) -> Result<RunReport> {
        let started = Utc::now();
        let clock = Instant::now();
        let run_id_str = run_id.to_string();

        obs::emit_run_started(&run_id_str, &self.module_names());
        info!(samples = sample.len(), "sample ready");

        let mut outcomes = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let outcome = provider
                .run(sample)
                .instrument(obs::module_span(provider.name()))
                .await?;

            obs::emit_module_finished(
                &outcome.module,
                outcome.passing,
                outcome.messages.len(),
                outcome.errors.len(),
            );
            outcomes.push(outcome);
        }

        let modules = outcomes
            .iter()
            .map(|o| ModuleSummary {
                module: o.module.clone(),
                passing: o.passing,
                messages: o.messages.len(),
                errors: o.errors.len(),
            })
            .collect();
        let summary = RunSummary::new(run_id, started, sample.len(), modules);
        let messages = outcomes.iter().flat_map(|o| o.messages.clone()).collect();

        obs::emit_run_finished(
            &run_id_str,
            clock.elapsed().as_millis() as u64,
            sample.len(),
            summary.passing,
        );

        Ok(RunReport {
            summary,
            messages,
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::domain::{DiffKind, DiffRecord, PathError, SeoError, SnapshotValue};

    struct Fixed {
        name: &'static str,
        diffs: usize,
        errors: usize,
        fail: bool,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, sample: &[SamplePath]) -> Result<ModuleOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SeoError::Config(format!("{} misconfigured", self.name)));
            }
            let diffs: Vec<DiffRecord> = sample
                .iter()
                .take(self.diffs)
                .map(|p| DiffRecord {
                    path: p.clone(),
                    item: "content.title".into(),
                    kind: DiffKind::Change,
                    element: String::new(),
                    production: SnapshotValue::from("a"),
                    staging: SnapshotValue::from("b"),
                })
                .collect();
            let errors = sample
                .iter()
                .take(self.errors)
                .map(|p| PathError {
                    path: p.clone(),
                    error: "missing".into(),
                })
                .collect();
            Ok(ModuleOutcome::from_diffs(self.name, &diffs, errors))
        }
    }

    fn fixed(name: &'static str, diffs: usize, errors: usize, fail: bool) -> (Box<dyn Provider>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let provider = Fixed {
            name,
            diffs,
            errors,
            fail,
            runs: Arc::clone(&runs),
        };
        (Box::new(provider), runs)
    }

    fn sample() -> Vec<SamplePath> {
        vec![SamplePath::from("/"), SamplePath::from("/about/")]
    }

    #[tokio::test]
    async fn test_overall_pass_is_and_of_modules() {
        let (clean, _) = fixed("clean", 0, 1, false);
        let (dirty, _) = fixed("dirty", 2, 0, false);
        let orchestrator = Orchestrator::new(Sampler::new("unused.txt", 95.0, 5.0), vec![clean, dirty]);

        let report = orchestrator.execute(Uuid::new_v4(), &sample()).await.expect("run");
        assert!(!report.summary.passing);
        assert_eq!(report.summary.samples, 2);
        assert_eq!(report.summary.modules[0].errors, 1);
        assert!(report.summary.modules[0].passing);
        assert!(!report.summary.modules[1].passing);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages.iter().all(|m| m.module == "dirty"));
    }

    #[tokio::test]
    async fn test_fatal_module_aborts_remaining_modules() {
        let (broken, _) = fixed("broken", 0, 0, true);
        let (after, after_runs) = fixed("after", 0, 0, false);
        let orchestrator = Orchestrator::new(Sampler::new("unused.txt", 95.0, 5.0), vec![broken, after]);

        let err = orchestrator.execute(Uuid::new_v4(), &sample()).await.expect_err("fatal");
        assert!(err.to_string().contains("broken misconfigured"));
        assert_eq!(after_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_reuses_sample_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("path_samples.txt");
        std::fs::write(&file, "/one\n/two\n/three\n").expect("write");

        let (clean, runs) = fixed("clean", 0, 0, false);
        let orchestrator = Orchestrator::new(Sampler::new(&file, 95.0, 5.0), vec![clean]);

        let report = orchestrator.run(None).await.expect("run");
        assert!(report.summary.passing);
        assert_eq!(report.summary.samples, 3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_without_sample_or_source_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator = Orchestrator::new(
            Sampler::new(dir.path().join("missing.txt"), 95.0, 5.0),
            Vec::new(),
        );
        assert!(matches!(
            orchestrator.run(None).await,
            Err(SeoError::Sampling(_))
        ));
    }
}
