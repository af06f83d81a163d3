//! Integration tests for the headless provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use seodeploy_core::{
    ExclusionRule, ExclusionSpec, PageSnapshot, Provider, ProviderRegistry, SamplePath,
    SeoConfig, SnapshotError,
};
use seodeploy_headless::{
    extract_page, HeadlessConfig, HeadlessProvider, Renderer, StaticHtmlRenderer,
};

/// Renderer serving fixed HTML per URL; unknown URLs fail.
#[derive(Default)]
struct FixtureRenderer {
    pages: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FixtureRenderer {
    fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn render(&self, url: &str) -> Result<PageSnapshot, SnapshotError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(html) => extract_page(html),
            None => Err(SnapshotError::Render(format!("net::ERR_NAME_NOT_RESOLVED {url}"))),
        }
    }
}

fn config() -> HeadlessConfig {
    let mut config = HeadlessConfig::new("https://www.example.com", "https://staging.example.com");
    config.batch_size = 2;
    config.ignore = ExclusionSpec::new()
        .with("content.title", ExclusionRule::Ignore(false))
        .with("content.h1", ExclusionRule::Ignore(false))
        .with("content.links", ExclusionRule::Ignore(true));
    config
}

fn paths(ps: &[&str]) -> Vec<SamplePath> {
    ps.iter().map(|p| SamplePath::from(*p)).collect()
}

#[tokio::test]
async fn test_identical_pages_pass() {
    let html = "<title>Home</title><h1>Welcome</h1><a href='/x'>x</a>";
    let renderer = FixtureRenderer::default()
        .page("https://www.example.com/", html)
        .page("https://staging.example.com/", html);

    let provider = HeadlessProvider::new(config(), Arc::new(renderer), 1).expect("provider");
    let outcome = provider.run(&paths(&["/"])).await.expect("outcome");

    assert!(outcome.passing);
    assert!(outcome.messages.is_empty());
    assert!(outcome.errors.is_empty());
}

#[tokio::test]
async fn test_changed_heading_is_reported() {
    let renderer = FixtureRenderer::default()
        .page("https://www.example.com/a", "<title>A</title><h1>Old</h1><a href='/1'>1</a>")
        .page("https://staging.example.com/a", "<title>A</title><h1>New</h1><a href='/2'>2</a>")
        .page("https://www.example.com/b", "<title>B</title>")
        .page("https://staging.example.com/b", "<title>B</title>")
        .page("https://www.example.com/c", "<title>C</title>")
        .page("https://staging.example.com/c", "<title>C</title>");

    let provider = HeadlessProvider::new(config(), Arc::new(renderer), 2).expect("provider");
    let outcome = provider
        .run(&paths(&["/a", "/b", "/c"]))
        .await
        .expect("outcome");

    assert!(!outcome.passing);
    let kinds: Vec<(&str, &str)> = outcome
        .messages
        .iter()
        .map(|m| (m.kind.as_str(), m.item.as_str()))
        .collect();
    assert_eq!(kinds, vec![("add", "content.h1"), ("remove", "content.h1")]);
    assert!(outcome.messages.iter().all(|m| m.path == "/a"));
}

#[tokio::test]
async fn test_render_failure_is_a_path_error() {
    let renderer = Arc::new(
        FixtureRenderer::default()
            .page("https://www.example.com/ok", "<title>Ok</title>")
            .page("https://staging.example.com/ok", "<title>Ok</title>")
            .page("https://www.example.com/down", "<title>Down</title>"),
    );

    let provider =
        HeadlessProvider::new(config(), renderer.clone(), 1).expect("provider");
    let outcome = provider
        .run(&paths(&["/ok", "/down"]))
        .await
        .expect("outcome");

    assert!(outcome.passing);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].path.as_str(), "/down");
    assert!(
        outcome.errors[0]
            .error
            .contains("staging: Max tries exhausted for: https://staging.example.com/down"),
        "{}",
        outcome.errors[0].error
    );
    assert_eq!(renderer.calls_for("https://staging.example.com/down"), 3);
    assert_eq!(renderer.calls_for("https://www.example.com/down"), 1);
}

#[test]
fn test_registry_activates_headless_from_table() {
    let mut registry = ProviderRegistry::new();
    seodeploy_headless::register(&mut registry);

    let config = SeoConfig::from_toml_str(
        r#"
        [modules.headless]
        prod_host = "https://www.example.com"
        stage_host = "https://staging.example.com"
        "#,
    )
    .expect("config");
    let providers = registry.activate(&config).expect("activate");
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].name(), "headless");
}

#[tokio::test]
async fn test_static_renderer_sends_stage_credentials() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let seen = Arc::new(Mutex::new(String::new()));

    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => raw.extend_from_slice(&buf[..n]),
                }
            }
            *log.lock().unwrap() = String::from_utf8_lossy(&raw).to_lowercase();

            let body = "<html><head><title>Staged</title></head></html>";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    let stage_host = format!("http://{addr}");
    let mut config = HeadlessConfig::new("https://www.example.com", &stage_host);
    config.stage_auth_user = Some("qa".into());
    config.stage_auth_pass = Some("secret".into());
    let renderer = StaticHtmlRenderer::new(&config).expect("renderer");

    let snap = renderer
        .render(&format!("{stage_host}/page"))
        .await
        .expect("rendered");
    assert_eq!(
        snap.get("content.title"),
        Some(&seodeploy_core::SnapshotValue::from(vec!["Staged"]))
    );

    let request = seen.lock().unwrap().clone();
    assert!(request.starts_with("get /page http/1.1"), "{request}");
    // base64("qa:secret")
    assert!(request.contains("authorization: basic cwe6c2vjcmv0"), "{request}");
    assert!(request.contains("chrome/79"), "{request}");
}
