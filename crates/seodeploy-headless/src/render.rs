//! Page renderers.
//!
//! A [`Renderer`] turns a URL into a [`PageSnapshot`]. The bundled
//! [`StaticHtmlRenderer`] fetches the served HTML and extracts content
//! without executing scripts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, error, warn};

use seodeploy_core::{PageSnapshot, SnapshotError};

use crate::config::HeadlessConfig;
use crate::extract::{extract_content, Patterns};

/// Produces a snapshot of the page at a URL.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<PageSnapshot, SnapshotError>;
}

/// Render `url`, retrying failures up to `attempts` times in total.
pub async fn render_with_retry(
    renderer: &dyn Renderer,
    url: &str,
    attempts: usize,
) -> Result<PageSnapshot, SnapshotError> {
    if url.is_empty() {
        return Err(SnapshotError::Render(
            "A valid URL was not supplied".to_string(),
        ));
    }

    for attempt in 1..=attempts.max(1) {
        match renderer.render(url).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) => warn!(url = %url, attempt = attempt, error = %e, "render failed"),
        }
    }

    error!(url = %url, "render attempts exhausted");
    Err(SnapshotError::Render(format!("Max tries exhausted for: {url}")))
}

// ---------------------------------------------------------------------------
// StaticHtmlRenderer
// ---------------------------------------------------------------------------

/// Fetches HTML over HTTP and extracts content with [`Patterns`].
pub struct StaticHtmlRenderer {
    http_client: reqwest::Client,
    patterns: Patterns,
    stage_origin: Option<Url>,
    stage_auth: Option<(String, String)>,
}

impl StaticHtmlRenderer {
    pub fn new(config: &HeadlessConfig) -> Result<Self, SnapshotError> {
        Self::with_timeout(config, config.timeout())
    }

    pub fn with_timeout(config: &HeadlessConfig, timeout: Duration) -> Result<Self, SnapshotError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()
            .map_err(|e| SnapshotError::Render(e.to_string()))?;
        let patterns = Patterns::new().map_err(|e| SnapshotError::Malformed(e.to_string()))?;

        Ok(Self {
            http_client,
            patterns,
            stage_origin: Url::parse(&config.stage_host).ok(),
            stage_auth: config
                .stage_auth()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
        })
    }

    /// True when `url` shares scheme, host and port with the staging host.
    fn sends_credentials_to(&self, url: &str) -> bool {
        let (Some(stage), Ok(target)) = (&self.stage_origin, Url::parse(url)) else {
            return false;
        };
        stage.origin() == target.origin()
    }
}

#[async_trait]
impl Renderer for StaticHtmlRenderer {
    async fn render(&self, url: &str) -> Result<PageSnapshot, SnapshotError> {
        let mut request = self.http_client.get(url);
        if let Some((user, pass)) = &self.stage_auth {
            if self.sends_credentials_to(url) {
                request = request.basic_auth(user, Some(pass));
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| SnapshotError::Render(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SnapshotError::Render(format!("HTTP {status} for {url}")));
        }
        let html = response
            .text()
            .await
            .map_err(|e| SnapshotError::Render(e.to_string()))?;
        debug!(url = %url, bytes = html.len(), "fetched page");

        Ok(extract_content(&html, &self.patterns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Renderer for Flaky {
        async fn render(&self, _url: &str) -> Result<PageSnapshot, SnapshotError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(SnapshotError::Render("net::ERR_CONNECTION_RESET".into()))
            } else {
                Ok(PageSnapshot::new().with("content.title", vec!["ok"]))
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_before_limit() {
        let renderer = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let snap = render_with_retry(&renderer, "https://a.test/", 3)
            .await
            .expect("third attempt succeeds");
        assert!(snap.get("content.title").is_some());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_names_url() {
        let renderer = Flaky {
            failures: 10,
            calls: AtomicUsize::new(0),
        };
        let err = render_with_retry(&renderer, "https://a.test/x", 3)
            .await
            .expect_err("exhausted");
        assert_eq!(
            err,
            SnapshotError::Render("Max tries exhausted for: https://a.test/x".into())
        );
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_url_is_not_attempted() {
        let renderer = Flaky {
            failures: 0,
            calls: AtomicUsize::new(0),
        };
        assert!(render_with_retry(&renderer, "", 3).await.is_err());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stage_credentials_follow_origin_not_prefix() {
        let mut config = HeadlessConfig::new("https://www.example.com", "https://example.com");
        config.stage_auth_user = Some("qa".into());
        config.stage_auth_pass = Some("secret".into());
        let renderer = StaticHtmlRenderer::new(&config).expect("renderer");

        assert!(renderer.sends_credentials_to("https://example.com/x"));
        assert!(renderer.sends_credentials_to("https://example.com:443/x"));
        assert!(!renderer.sends_credentials_to("https://example.com.au/x"));
        assert!(!renderer.sends_credentials_to("https://example.com@evil.test/x"));
        assert!(!renderer.sends_credentials_to("http://example.com/x"));
        assert!(!renderer.sends_credentials_to("https://example.com:8443/x"));
        assert!(!renderer.sends_credentials_to("https://www.example.com/x"));
        assert!(!renderer.sends_credentials_to("/relative"));
    }

    #[test]
    fn test_unparseable_stage_host_sends_no_credentials() {
        let mut config = HeadlessConfig::new("https://www.example.com", "");
        config.stage_auth_user = Some("qa".into());
        config.stage_auth_pass = Some("secret".into());
        let renderer = StaticHtmlRenderer::new(&config).expect("renderer");

        assert!(!renderer.sends_credentials_to("https://example.com/x"));
    }
}
