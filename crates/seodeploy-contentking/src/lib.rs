//! ContentKing integration for SEODeploy
//!
//! Triggers re-crawls through the CMS API, polls the Reporting API until
//! both environments hold data newer than the run start, then diffs them.

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod provider;

pub use client::{ContentKingClient, ContentKingNotifier, ContentKingStatus, IndexablePages, PageEntry};
pub use config::{ApiSettings, ContentKingConfig};
pub use error::{ContentKingError, Result};
pub use extract::{snapshot_from_report, status_from_report, CONTENTKING_ISSUES};
pub use provider::{ContentKingProvider, MODULE_NAME};

use seodeploy_core::ProviderRegistry;

/// Add the `contentking` module to `registry`.
pub fn register(registry: &mut ProviderRegistry) {
    registry.register(MODULE_NAME, ContentKingProvider::from_table);
}
