//! SEODeploy Core Library
//!
//! Staging-vs-production regression detection: statistical path sampling,
//! shard-parallel batch execution, convergence polling against a
//! crawl-status service and tolerance-aware structural diffing.

pub mod batch;
pub mod config;
pub mod convergence;
pub mod diff;
pub mod domain;
pub mod fakes;
pub mod module;
pub mod obs;
pub mod orchestrator;
pub mod reporting;
pub mod sampling;
pub mod telemetry;

pub use batch::{group_batcher, parallel_map, split_shards};

pub use config::{env_override, parse_module_config, SeoConfig, DEFAULT_CONFIG_FILE};

pub use convergence::{
    join_url, pair_records, ChangeNotifier, ConvergencePoller, CrawlStatusSource, NotifyError,
    PollSettings, StatusRecord, Target,
};

pub use diff::{compare, run_diffs, ExclusionRule, ExclusionSpec};

pub use domain::{
    ConvergenceRecord, DiffKind, DiffRecord, Environment, Message, PagePair, PageSnapshot,
    PathError, Result, SamplePath, SamplingError, SeoError, Shape, SnapshotError, SnapshotValue,
};

pub use module::{prepare_messages, ModuleOutcome, Provider, ProviderFactory, ProviderRegistry};

pub use orchestrator::{Orchestrator, RunReport};

pub use reporting::{ModuleSummary, RunSummary};

pub use sampling::{
    sample_size, url_to_path, PopulationSource, Sampler, SitemapFetcher, SitemapSource,
};

/// SEODeploy version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
