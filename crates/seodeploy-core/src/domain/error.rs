//! Error taxonomy for SEODeploy.
//!
//! Fatal errors ([`SeoError`]) abort a module or the whole run. Per-path data
//! problems ([`SnapshotError`]) are recoverable and end up in a module's error
//! list instead.

use crate::domain::records::Environment;

/// Errors produced while building a sample of paths.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("unsupported confidence level: {level} (expected one of 50, 68, 90, 95, 99)")]
    UnsupportedConfidenceLevel { level: f64 },

    #[error("no sample file found at {filename} and no population source (site id or sitemap url) given")]
    MissingPopulationSource { filename: String },

    #[error("population source returned no urls")]
    EmptyPopulation,

    #[error("failed to fetch population from {source_url}: {reason}")]
    Fetch { source_url: String, reason: String },

    #[error("sample file io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable, per-path data errors.
///
/// These never abort a batch; the affected path is skipped during diffing and
/// reported in the module's error list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SnapshotError {
    #[error("invalid response from crawl-status report")]
    Missing,

    #[error("malformed crawl-status record: {0}")]
    Malformed(String),

    #[error("unknown error: {0}")]
    Query(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("no {environment} record for path")]
    Unpaired { environment: Environment },
}

/// SEODeploy errors.
#[derive(Debug, thiserror::Error)]
pub enum SeoError {
    #[error("sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("change notification failed for {url}: {reason}")]
    NotificationFailed { url: String, reason: String },

    #[error(
        "convergence starvation in {environment}: {path} did not refresh after {attempts} attempts (host may not be re-indexing)"
    )]
    ConvergenceStarvation {
        environment: Environment,
        path: String,
        attempts: usize,
    },

    #[error("type mismatch for {path} item {item}: production is {production}, staging is {staging}")]
    TypeMismatch {
        path: String,
        item: String,
        production: &'static str,
        staging: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<reqwest::Error> for SeoError {
    fn from(err: reqwest::Error) -> Self {
        SeoError::Http(err.to_string())
    }
}

/// Result type for SEODeploy operations.
pub type Result<T> = std::result::Result<T, SeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starvation_error_names_path_and_environment() {
        let err = SeoError::ConvergenceStarvation {
            environment: Environment::Staging,
            path: "/blog/".to_string(),
            attempts: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("staging"));
        assert!(msg.contains("/blog/"));
        assert!(msg.contains("host may not be re-indexing"));
    }

    #[test]
    fn test_sampling_error_wraps() {
        let err: SeoError = SamplingError::UnsupportedConfidenceLevel { level: 42.0 }.into();
        assert!(err.to_string().contains("unsupported confidence level: 42"));
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::Unpaired {
            environment: Environment::Production,
        };
        assert_eq!(err.to_string(), "no production record for path");
        assert_eq!(
            SnapshotError::Query("timeout".to_string()).to_string(),
            "unknown error: timeout"
        );
    }
}
