//! Statistical sampling of site paths.
//!
//! Computes a Cochran sample size for a target confidence level/interval,
//! discovers a URL population (paginated report or sitemap tree), draws a
//! uniform sample without replacement and persists it as a plain-text file
//! with one path per line. An existing sample file is reused verbatim.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::domain::{SamplePath, SamplingError};
use crate::obs;

/// Supported confidence levels and their z-scores.
pub const Z_SCORES: [(f64, f64); 5] = [
    (50.0, 0.67),
    (68.0, 0.99),
    (90.0, 1.64),
    (95.0, 1.96),
    (99.0, 2.57),
];

/// Sample size for `population` at the given confidence `level` (percent)
/// and confidence `interval` (margin of error, percent).
///
/// Uses `n0 = z² · p(1-p) / e²` with `p = 0.5`, then the finite-population
/// correction `n = n0 / (1 + (n0 - 1) / N)`. The result is rounded up and
/// never exceeds the population.
pub fn sample_size(population: usize, level: f64, interval: f64) -> Result<usize, SamplingError> {
    let z = Z_SCORES
        .iter()
        .find(|(supported, _)| (supported - level).abs() < f64::EPSILON)
        .map(|(_, z)| *z)
        .ok_or(SamplingError::UnsupportedConfidenceLevel { level })?;

    if population == 0 {
        return Ok(0);
    }

    let e = interval / 100.0;
    let n0 = (z * z) * 0.5 * 0.5 / (e * e);
    let n = n0 / (1.0 + (n0 - 1.0) / population as f64);

    let size = n.ceil().max(0.0) as usize;
    Ok(size.min(population))
}

/// Reduce an absolute URL to its path plus query string.
///
/// Inputs that do not parse as absolute URLs are returned unchanged.
pub fn url_to_path(url: &str) -> SamplePath {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => SamplePath::new(format!("{}?{}", parsed.path(), query)),
            None => SamplePath::new(parsed.path()),
        },
        Err(_) => SamplePath::new(url),
    }
}

/// Draw `amount` distinct indices from `0..population`, sorted ascending.
///
/// `amount` is clamped to `population`.
pub fn draw_indices<R: Rng + ?Sized>(rng: &mut R, population: usize, amount: usize) -> Vec<usize> {
    let amount = amount.min(population);
    let mut indices = rand::seq::index::sample(rng, population, amount).into_vec();
    indices.sort_unstable();
    indices
}

// ---------------------------------------------------------------------------
// Population sources
// ---------------------------------------------------------------------------

/// Something that can enumerate the candidate URLs of a site.
#[async_trait]
pub trait PopulationSource: Send + Sync {
    /// Human-readable name for logs (site id, sitemap url).
    fn describe(&self) -> String;

    /// Discover absolute URLs, stopping once `limit` URLs are found.
    async fn discover(&self, limit: Option<usize>) -> Result<Vec<String>, SamplingError>;
}

/// Fetches the body of a sitemap document.
#[async_trait]
pub trait SitemapFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, SamplingError>;
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const SITEMAP_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// Sitemap fetcher backed by `reqwest`. Handles gzipped sitemaps.
pub struct HttpSitemapFetcher {
    client: reqwest::Client,
}

impl HttpSitemapFetcher {
    pub fn new() -> Result<Self, SamplingError> {
        let client = reqwest::Client::builder()
            .user_agent(SITEMAP_USER_AGENT)
            .build()
            .map_err(|e| SamplingError::Fetch {
                source_url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SitemapFetcher for HttpSitemapFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SamplingError> {
        let fetch_err = |reason: String| SamplingError::Fetch {
            source_url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fetch_err(e.to_string()))?;

        let declared_gzip = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("application/x-gzip"))
            || url.ends_with(".gz");

        let body = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;

        // Transfer-encoded gzip was already decoded by the client.
        if declared_gzip && body.starts_with(&GZIP_MAGIC) {
            let mut xml = String::new();
            GzDecoder::new(body.as_ref())
                .read_to_string(&mut xml)
                .map_err(|e| fetch_err(format!("gzip decode: {e}")))?;
            Ok(xml)
        } else {
            Ok(String::from_utf8_lossy(&body).into_owned())
        }
    }
}

const LOC_PATTERN: &str = r"(?is)<loc>\s*(.*?)\s*</loc>";

/// Extract `<loc>` entries from a sitemap or sitemap index, in document order.
pub fn extract_locs(xml: &str) -> Vec<String> {
    let Ok(re) = Regex::new(LOC_PATTERN) else {
        return Vec::new();
    };
    re.captures_iter(xml)
        .map(|c| {
            c[1].replace("&amp;", "&")
                .replace("&apos;", "'")
                .replace("&quot;", "\"")
                .replace("&lt;", "<")
                .replace("&gt;", ">")
        })
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Whether a `<loc>` entry refers to a nested sitemap.
pub fn is_sitemap_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.ends_with(".xml") || lower.ends_with(".xml.gz")
}

/// Population discovered from a sitemap, expanding nested sitemaps
/// depth-first in document order. Each sitemap is fetched at most once.
pub struct SitemapSource<F: SitemapFetcher> {
    root: String,
    fetcher: F,
}

impl<F: SitemapFetcher> SitemapSource<F> {
    pub fn new(root: impl Into<String>, fetcher: F) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }
}

impl SitemapSource<HttpSitemapFetcher> {
    pub fn http(root: impl Into<String>) -> Result<Self, SamplingError> {
        Ok(Self::new(root, HttpSitemapFetcher::new()?))
    }
}

#[async_trait]
impl<F: SitemapFetcher> PopulationSource for SitemapSource<F> {
    fn describe(&self) -> String {
        self.root.clone()
    }

    async fn discover(&self, limit: Option<usize>) -> Result<Vec<String>, SamplingError> {
        let mut urls = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();

        // The root is always treated as a sitemap; its failure is fatal.
        let root_xml = self.fetcher.fetch(&self.root).await?;
        visited.insert(self.root.clone());

        let mut stack: Vec<String> = extract_locs(&root_xml).into_iter().rev().collect();

        while let Some(loc) = stack.pop() {
            if !is_sitemap_url(&loc) {
                urls.push(loc);
                if limit.is_some_and(|l| urls.len() >= l) {
                    break;
                }
                continue;
            }

            if !visited.insert(loc.clone()) {
                debug!(sitemap = %loc, "skipping already visited sitemap");
                continue;
            }

            match self.fetcher.fetch(&loc).await {
                Ok(xml) => stack.extend(extract_locs(&xml).into_iter().rev()),
                Err(e) => warn!(sitemap = %loc, error = %e, "failed to read nested sitemap"),
            }
        }

        Ok(urls)
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Builds (or reloads) the set of sample paths for a run.
#[derive(Debug, Clone)]
pub struct Sampler {
    pub filename: PathBuf,
    pub confidence_level: f64,
    pub confidence_interval: f64,
    pub limit: Option<usize>,
}

impl Sampler {
    pub fn new(filename: impl Into<PathBuf>, confidence_level: f64, confidence_interval: f64) -> Self {
        Self {
            filename: filename.into(),
            confidence_level,
            confidence_interval,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Return the sample paths, reusing the sample file if it exists.
    ///
    /// Otherwise discovers the population from `source`, samples it and
    /// writes the sample file.
    pub async fn get_sample_paths(
        &self,
        source: Option<&dyn PopulationSource>,
    ) -> Result<Vec<SamplePath>, SamplingError> {
        let mut rng = StdRng::from_entropy();
        self.get_sample_paths_with_rng(source, &mut rng).await
    }

    pub async fn get_sample_paths_with_rng<R: Rng + Send + ?Sized>(
        &self,
        source: Option<&dyn PopulationSource>,
        rng: &mut R,
    ) -> Result<Vec<SamplePath>, SamplingError> {
        if self.filename.is_file() {
            info!(file = %self.filename.display(), "reloading existing sample file");
            return load_sample_file(&self.filename);
        }

        let source = source.ok_or_else(|| SamplingError::MissingPopulationSource {
            filename: self.filename.display().to_string(),
        })?;

        let population = source.discover(self.limit).await?;
        if population.is_empty() {
            return Err(SamplingError::EmptyPopulation);
        }

        let size = sample_size(population.len(), self.confidence_level, self.confidence_interval)?;
        let indices = draw_indices(rng, population.len(), size);

        let mut seen = HashSet::new();
        let paths: Vec<SamplePath> = indices
            .into_iter()
            .map(|i| url_to_path(&population[i]))
            .filter(|p| seen.insert(p.clone()))
            .collect();

        obs::emit_sampling_completed(&source.describe(), population.len(), paths.len());

        write_sample_file(&self.filename, &paths)?;
        info!(file = %self.filename.display(), "saved sample file");

        Ok(paths)
    }
}

/// Read a sample file: one path per line, blank lines ignored.
pub fn load_sample_file(path: &Path) -> Result<Vec<SamplePath>, SamplingError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(SamplePath::from)
        .collect())
}

/// Write a sample file with a trailing newline after every path.
pub fn write_sample_file(path: &Path, paths: &[SamplePath]) -> Result<(), SamplingError> {
    let mut content = String::new();
    for p in paths {
        content.push_str(p.as_str());
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}
