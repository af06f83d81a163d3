//! SEODeploy CLI
//!
//! The `seodeploy` command compares a sample of production and staging
//! pages and fails when they differ.
//!
//! ## Commands
//!
//! - `sample`: draw a statistically sized sample of paths into a file
//! - `execute`: run every configured module against the sample file

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use seodeploy_contentking::{ApiSettings, ContentKingClient, ContentKingConfig, IndexablePages};
use seodeploy_core::reporting::{render_summary, write_messages_csv};
use seodeploy_core::telemetry::{init_tracing, level_for_verbosity};
use seodeploy_core::{
    parse_module_config, Orchestrator, PopulationSource, ProviderRegistry, SamplePath, Sampler,
    SeoConfig, SitemapSource, DEFAULT_CONFIG_FILE,
};

/// How many sampled paths `sample` prints.
const PREVIEW_PATHS: usize = 5;

#[derive(Parser)]
#[command(name = "seodeploy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Detect SEO regressions between staging and production", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample URL paths into the samples file (an existing file is reused)
    Sample {
        /// Sample the indexable pages of this ContentKing website
        #[arg(long, conflicts_with = "sitemap_url")]
        site_id: Option<String>,

        /// Sample the URLs of this sitemap or sitemap index
        #[arg(long)]
        sitemap_url: Option<String>,

        /// Maximum number of URLs to sample from
        #[arg(long)]
        limit: Option<usize>,

        /// Output file (default: `samples_filename` from the config)
        #[arg(long)]
        samples_filename: Option<PathBuf>,
    },

    /// Compare staging against production for every sampled path
    Execute {
        /// Samples file (default: `samples_filename` from the config)
        #[arg(long)]
        samples_filename: Option<PathBuf>,
    },
}

/// Population a `sample` run draws from.
#[derive(Debug, Clone, PartialEq)]
enum SampleSource {
    ContentKing(String),
    Sitemap(String),
}

impl SampleSource {
    fn from_args(site_id: Option<String>, sitemap_url: Option<String>) -> Result<Self> {
        match (site_id, sitemap_url) {
            (Some(site_id), None) => Ok(SampleSource::ContentKing(site_id)),
            (None, Some(url)) => Ok(SampleSource::Sitemap(url)),
            (Some(_), Some(_)) => bail!("Only one of --site-id or --sitemap-url may be given"),
            (None, None) => bail!("Either --site-id or --sitemap-url is required to run sampling"),
        }
    }

    fn label(&self) -> &str {
        match self {
            SampleSource::ContentKing(id) | SampleSource::Sitemap(id) => id,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.json, level_for_verbosity(cli.verbose));

    let mut config = SeoConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;

    match cli.command {
        Commands::Sample {
            site_id,
            sitemap_url,
            limit,
            samples_filename,
        } => {
            let source = SampleSource::from_args(site_id, sitemap_url)?;
            apply_overrides(&mut config, samples_filename, limit);
            cmd_sample(&config, &source).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Execute { samples_filename } => {
            apply_overrides(&mut config, samples_filename, None);
            let passing = cmd_execute(&config).await?;
            Ok(if passing {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn apply_overrides(config: &mut SeoConfig, samples_filename: Option<PathBuf>, limit: Option<usize>) {
    if let Some(filename) = samples_filename {
        config.samples_filename = filename;
    }
    if limit.is_some() {
        config.url_limit = limit;
    }
}

/// Registry of every built-in module.
fn build_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    seodeploy_contentking::register(&mut registry);
    seodeploy_headless::register(&mut registry);
    registry
}

/// ContentKing API settings from `[modules.contentking]` when present,
/// otherwise defaults; keys may come from the environment either way.
fn contentking_population(config: &SeoConfig, site_id: &str) -> Result<IndexablePages> {
    let (api, per_page) = match config.modules.get(seodeploy_contentking::MODULE_NAME) {
        Some(table) => {
            let module: ContentKingConfig =
                parse_module_config(seodeploy_contentking::MODULE_NAME, table)?;
            let module = module.with_env_overrides();
            (module.api, module.per_page)
        }
        None => (ApiSettings::from_env(), 300),
    };
    let client = ContentKingClient::new(api).context("Failed to build ContentKing client")?;
    Ok(IndexablePages::new(client, site_id, per_page))
}

/// Create the samples file from the chosen population.
///
/// An existing samples file is reused as-is; delete it to draw a new sample.
async fn cmd_sample(config: &SeoConfig, source: &SampleSource) -> Result<Vec<SamplePath>> {
    config.validate()?;

    let sampler = Sampler::new(
        config.samples_filename.clone(),
        config.confidence_level,
        config.confidence_interval,
    )
    .with_limit(config.url_limit);

    let population: Box<dyn PopulationSource> = match source {
        SampleSource::ContentKing(site_id) => Box::new(contentking_population(config, site_id)?),
        SampleSource::Sitemap(url) => Box::new(
            SitemapSource::http(url.as_str()).context("Failed to build sitemap fetcher")?,
        ),
    };

    let samples = sampler
        .get_sample_paths(Some(population.as_ref()))
        .await
        .with_context(|| format!("Sampling failed for {}", source.label()))?;

    info!(
        samples = samples.len(),
        file = %config.samples_filename.display(),
        "samples file ready"
    );
    println!(
        "Top {} out of {} sampled paths for {}",
        PREVIEW_PATHS.min(samples.len()),
        samples.len(),
        source.label()
    );
    let preview: Vec<&str> = samples
        .iter()
        .take(PREVIEW_PATHS)
        .map(SamplePath::as_str)
        .collect();
    println!("{}", serde_json::to_string_pretty(&preview)?);

    Ok(samples)
}

/// Run the pipeline and write the report. Returns the overall pass flag.
async fn cmd_execute(config: &SeoConfig) -> Result<bool> {
    config.validate()?;
    if !config.samples_filename.is_file() {
        bail!(
            "Samples file {:?} not found; run `seodeploy sample` first or pass --samples-filename",
            config.samples_filename
        );
    }
    if config.modules.is_empty() {
        bail!("No modules configured; add a [modules.<name>] table to the config");
    }

    let registry = build_registry();
    let orchestrator =
        Orchestrator::from_config(config, &registry).context("Failed to activate modules")?;
    info!(modules = ?orchestrator.module_names(), "starting run");

    let report = orchestrator.run(None).await.context("Run aborted")?;

    write_report(&config.output_csv, &report.messages)?;
    println!("{}", render_summary(&report.summary)?);

    Ok(report.summary.passing)
}

fn write_report(path: &Path, messages: &[seodeploy_core::Message]) -> Result<()> {
    write_messages_csv(path, messages)?;
    info!(messages = messages.len(), file = %path.display(), "wrote report");
    Ok(())
}
