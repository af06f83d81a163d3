//! ContentKing CMS and Reporting API client.
//!
//! - `check_url` (CMS API): ask ContentKing to re-crawl a URL
//! - `websites/{id}/pages?url=` (Reporting API): latest data for one URL
//! - `websites/{id}/pages/list` (Reporting API): paginated page list

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use seodeploy_core::{
    join_url, ChangeNotifier, CrawlStatusSource, NotifyError, PopulationSource, SamplePath,
    SamplingError, SnapshotError, StatusRecord,
};

use crate::config::ApiSettings;
use crate::error::{fetch_error, ContentKingError, Result};
use crate::extract::status_from_report;

const USER_AGENT: &str = concat!("seodeploy/", env!("CARGO_PKG_VERSION"));

/// Attempts for Reporting API reads.
pub const REPORT_ATTEMPTS: usize = 3;

/// Pause between pages of the page list report.
pub const PAGE_WAIT: Duration = Duration::from_secs(2);

/// One page of the page list report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub url: String,
    pub is_indexable: bool,
}

/// HTTP client for both ContentKing APIs
#[derive(Clone)]
pub struct ContentKingClient {
    settings: ApiSettings,
    http_client: reqwest::Client,
}

impl ContentKingClient {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout())
            .build()?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ApiSettings::from_env())
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn api_url(&self, route: &str) -> String {
        join_url(&self.settings.endpoint, route)
    }

    /// Map a non-success response into [`ContentKingError::Status`],
    /// keeping the API's `message` field when present.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        Err(ContentKingError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Single `check_url` request.
    pub async fn check_url(&self, url: &str) -> Result<()> {
        let key = self.settings.cms_key()?;
        let response = self
            .http_client
            .post(self.api_url("check_url"))
            .header(reqwest::header::AUTHORIZATION, format!("token {key}"))
            .json(&json!({ "url": url }))
            .send()
            .await?;
        Self::check_status(response).await?;
        debug!(url = %url, "check_url accepted");
        Ok(())
    }

    /// GET a Reporting API route, retrying transport failures.
    pub async fn get_report(&self, route: &str, query: &[(&str, String)]) -> Result<Value> {
        let key = self.settings.report_key()?;
        let url = self.api_url(route);
        let mut last = ContentKingError::Transport("no attempt made".to_string());

        for attempt in 1..=REPORT_ATTEMPTS {
            let sent = self
                .http_client
                .get(&url)
                .header(reqwest::header::AUTHORIZATION, format!("token {key}"))
                .query(query)
                .send()
                .await
                .map_err(ContentKingError::from);

            let outcome = match sent {
                Ok(response) => match Self::check_status(response).await {
                    Ok(response) => response.json::<Value>().await.map_err(ContentKingError::from),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() => {
                    warn!(route = %route, attempt = attempt, error = %e, "report request failed");
                    last = e;
                    if attempt < REPORT_ATTEMPTS {
                        tokio::time::sleep(self.settings.retry_backoff() * attempt as u32).await;
                    }
                }
                Err(e) => {
                    error!(route = %route, error = %e, "report request rejected");
                    return Err(e);
                }
            }
        }

        Err(last)
    }

    /// Latest URL report for `url` on website `site_id`.
    pub async fn url_report(&self, site_id: &str, url: &str) -> Result<Value> {
        self.get_report(
            &format!("websites/{site_id}/pages"),
            &[("url", url.to_string())],
        )
        .await
    }

    /// One page of the page list report.
    pub async fn pages(&self, site_id: &str, page: usize, per_page: usize) -> Result<Vec<PageEntry>> {
        let body = self
            .get_report(
                &format!("websites/{site_id}/pages/list"),
                &[("page", page.to_string()), ("per_page", per_page.to_string())],
            )
            .await?;

        let urls = body
            .get("urls")
            .and_then(Value::as_array)
            .ok_or_else(|| ContentKingError::Decode("page list without `urls`".to_string()))?;

        Ok(urls
            .iter()
            .filter_map(|entry| {
                let url = entry.get("url").and_then(Value::as_str)?;
                Some(PageEntry {
                    url: url.to_string(),
                    is_indexable: entry
                        .get("is_indexable")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                })
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Core trait adapters
// ---------------------------------------------------------------------------

/// Change notifier backed by the CMS API. Retries are left to the caller.
pub struct ContentKingNotifier {
    client: ContentKingClient,
}

impl ContentKingNotifier {
    pub fn new(client: ContentKingClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangeNotifier for ContentKingNotifier {
    async fn notify_change(&self, url: &str) -> std::result::Result<(), NotifyError> {
        match self.client.check_url(url).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_transient() => Err(NotifyError::Transient(e.to_string())),
            Err(e) => Err(NotifyError::Rejected(e.to_string())),
        }
    }
}

/// Crawl-status source reading URL reports of one website.
pub struct ContentKingStatus {
    client: ContentKingClient,
    site_id: String,
    host: String,
    time_col: String,
}

impl ContentKingStatus {
    pub fn new(client: ContentKingClient, site_id: &str, host: &str, time_col: &str) -> Self {
        Self {
            client,
            site_id: site_id.to_string(),
            host: host.to_string(),
            time_col: time_col.to_string(),
        }
    }
}

#[async_trait]
impl CrawlStatusSource for ContentKingStatus {
    async fn fetch_status(
        &self,
        path: &SamplePath,
    ) -> std::result::Result<Option<StatusRecord>, SnapshotError> {
        let url = join_url(&self.host, path.as_str());
        let report = self.client.url_report(&self.site_id, &url).await?;
        status_from_report(&report, &self.time_col)
    }
}

/// Population of indexable URLs from the page list report.
pub struct IndexablePages {
    client: ContentKingClient,
    site_id: String,
    per_page: usize,
    page_wait: Duration,
}

impl IndexablePages {
    pub fn new(client: ContentKingClient, site_id: &str, per_page: usize) -> Self {
        Self {
            client,
            site_id: site_id.to_string(),
            per_page: per_page.max(1),
            page_wait: PAGE_WAIT,
        }
    }

    pub fn with_page_wait(mut self, page_wait: Duration) -> Self {
        self.page_wait = page_wait;
        self
    }
}

#[async_trait]
impl PopulationSource for IndexablePages {
    fn describe(&self) -> String {
        format!("contentking site {}", self.site_id)
    }

    async fn discover(&self, limit: Option<usize>) -> std::result::Result<Vec<String>, SamplingError> {
        let mut urls = Vec::new();
        let mut page = 1;

        loop {
            let entries = self
                .client
                .pages(&self.site_id, page, self.per_page)
                .await
                .map_err(|e| fetch_error(&self.describe(), e))?;
            let received = entries.len();

            urls.extend(entries.into_iter().filter(|e| e.is_indexable).map(|e| e.url));
            info!(site_id = %self.site_id, page = page, urls = urls.len(), "loaded page list");

            if let Some(limit) = limit {
                if urls.len() >= limit {
                    urls.truncate(limit);
                    break;
                }
            }
            if received < self.per_page {
                break;
            }

            tokio::time::sleep(self.page_wait).await;
            page += 1;
        }

        Ok(urls)
    }
}
