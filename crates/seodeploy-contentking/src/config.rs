//! `[modules.contentking]` configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use seodeploy_core::{env_override, ExclusionSpec, PollSettings};

use crate::error::{ContentKingError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api.contentkingapp.com/v1/";
pub const DEFAULT_TIME_COL: &str = "unstable_last_checked_at";

/// Environment variable overriding `cms_api_key`.
pub const CMS_API_KEY_ENV: &str = "CONTENTKING_CMS_API_KEY";
/// Environment variable overriding `report_api_key`.
pub const REPORT_API_KEY_ENV: &str = "CONTENTKING_REPORT_API_KEY";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_time_col() -> String {
    DEFAULT_TIME_COL.to_string()
}

fn default_api_timeout() -> u64 {
    20
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_wait() -> u64 {
    10
}

fn default_retry_backoff() -> u64 {
    10
}

fn default_per_page() -> usize {
    300
}

/// Connection settings shared by every ContentKing API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// CMS API key, used for change notifications.
    #[serde(default)]
    pub cms_api_key: Option<String>,
    /// Reporting API key, used for URL and page reports.
    #[serde(default)]
    pub report_api_key: Option<String>,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    /// Backoff unit between retries of transient failures.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            cms_api_key: None,
            report_api_key: None,
            api_timeout_secs: default_api_timeout(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

impl ApiSettings {
    /// Defaults with API keys taken from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Replace API keys with `CONTENTKING_*_API_KEY` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = env_override(CMS_API_KEY_ENV) {
            self.cms_api_key = Some(key);
        }
        if let Some(key) = env_override(REPORT_API_KEY_ENV) {
            self.report_api_key = Some(key);
        }
        self
    }

    pub fn cms_key(&self) -> Result<&str> {
        self.cms_api_key
            .as_deref()
            .ok_or(ContentKingError::MissingApiKey("CMS"))
    }

    pub fn report_key(&self) -> Result<&str> {
        self.report_api_key
            .as_deref()
            .ok_or(ContentKingError::MissingApiKey("Reporting"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// Typed contents of `[modules.contentking]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentKingConfig {
    #[serde(flatten)]
    pub api: ApiSettings,
    pub prod_host: String,
    pub stage_host: String,
    pub prod_site_id: String,
    pub stage_site_id: String,
    /// URL report field holding the last crawl timestamp.
    #[serde(default = "default_time_col")]
    pub time_col: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_wait")]
    pub batch_wait_secs: u64,
    /// Page size of the indexable pages report.
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    #[serde(default)]
    pub requeue_delay_secs: u64,
    #[serde(default)]
    pub ignore: ExclusionSpec,
}

impl ContentKingConfig {
    pub fn with_env_overrides(mut self) -> Self {
        self.api = self.api.with_env_overrides();
        self
    }

    /// Poll settings for this module; `max_workers` comes from the run config.
    pub fn poll_settings(&self, max_workers: usize) -> PollSettings {
        PollSettings {
            batch_size: self.batch_size.max(1),
            max_workers: max_workers.max(1),
            batch_wait: Duration::from_secs(self.batch_wait_secs),
            retry_backoff: self.api.retry_backoff(),
            requeue_delay: Duration::from_secs(self.requeue_delay_secs),
            ..PollSettings::default()
        }
    }
}
