//! `[modules.headless]` configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use seodeploy_core::ExclusionSpec;

/// Browser-like user agent sent with every render request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/79.0.3945.130 Safari/537.36";

fn default_batch_size() -> usize {
    10
}

fn default_render_attempts() -> usize {
    3
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Typed contents of `[modules.headless]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlessConfig {
    pub prod_host: String,
    pub stage_host: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_render_attempts")]
    pub render_attempts: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Basic-auth credentials sent only to `stage_host`.
    #[serde(default)]
    pub stage_auth_user: Option<String>,
    #[serde(default)]
    pub stage_auth_pass: Option<String>,
    #[serde(default)]
    pub ignore: ExclusionSpec,
}

impl HeadlessConfig {
    pub fn new(prod_host: &str, stage_host: &str) -> Self {
        Self {
            prod_host: prod_host.to_string(),
            stage_host: stage_host.to_string(),
            batch_size: default_batch_size(),
            render_attempts: default_render_attempts(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            stage_auth_user: None,
            stage_auth_pass: None,
            ignore: ExclusionSpec::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Staging credentials, when both halves are configured.
    pub fn stage_auth(&self) -> Option<(&str, &str)> {
        match (&self.stage_auth_user, &self.stage_auth_pass) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}
