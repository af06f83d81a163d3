//! Direct-render page comparison for SEODeploy
//!
//! Renders each sampled path on production and staging, extracts the SEO
//! content elements and diffs them. No crawl-status service is involved.

pub mod config;
pub mod extract;
pub mod provider;
pub mod render;

pub use config::{HeadlessConfig, DEFAULT_USER_AGENT};
pub use extract::{extract_content, extract_page, Patterns};
pub use provider::{HeadlessProvider, MODULE_NAME};
pub use render::{render_with_retry, Renderer, StaticHtmlRenderer};

use seodeploy_core::ProviderRegistry;

/// Add the `headless` module to `registry`.
pub fn register(registry: &mut ProviderRegistry) {
    registry.register(MODULE_NAME, HeadlessProvider::from_table);
}
