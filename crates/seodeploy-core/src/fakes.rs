//! In-memory fakes for the I/O traits (testing only)
//!
//! Provides `ScriptedStatusSource`, `RecordingNotifier`,
//! `MemorySitemapFetcher` and `StaticPopulation` that satisfy the trait
//! contracts without any network access.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::convergence::{ChangeNotifier, CrawlStatusSource, NotifyError, StatusRecord};
use crate::domain::{PageSnapshot, SamplePath, SamplingError, SnapshotError};
use crate::sampling::{PopulationSource, SitemapFetcher};

// ---------------------------------------------------------------------------
// ScriptedStatusSource
// ---------------------------------------------------------------------------

type StatusReply = Result<Option<StatusRecord>, SnapshotError>;

/// Crawl-status source that replays a per-path script of replies.
///
/// Each query pops the next reply; the last reply of a script repeats
/// forever. Unscripted paths have no record.
#[derive(Debug, Default)]
pub struct ScriptedStatusSource {
    scripts: Mutex<HashMap<SamplePath, VecDeque<StatusReply>>>,
    queries: Mutex<HashMap<SamplePath, usize>>,
}

impl ScriptedStatusSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, reply: StatusReply) {
        self.scripts
            .lock()
            .unwrap()
            .entry(SamplePath::from(path))
            .or_default()
            .push_back(reply);
    }

    /// Queue a record checked at `checked_at`.
    pub fn push_record(&self, path: &str, checked_at: DateTime<Utc>, snapshot: PageSnapshot) {
        self.push(
            path,
            Ok(Some(StatusRecord {
                checked_at,
                snapshot,
            })),
        );
    }

    pub fn push_missing(&self, path: &str) {
        self.push(path, Ok(None));
    }

    pub fn push_error(&self, path: &str, error: SnapshotError) {
        self.push(path, Err(error));
    }

    /// Number of times `path` was queried.
    pub fn queries_for(&self, path: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .get(&SamplePath::from(path))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CrawlStatusSource for ScriptedStatusSource {
    async fn fetch_status(&self, path: &SamplePath) -> StatusReply {
        *self.queries.lock().unwrap().entry(path.clone()).or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts.get_mut(path) else {
            return Ok(None);
        };
        if script.len() > 1 {
            script.pop_front().unwrap_or(Ok(None))
        } else {
            script.front().cloned().unwrap_or(Ok(None))
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct NotifierState {
    calls: HashMap<String, usize>,
    transient_failures: HashMap<String, usize>,
    rejected: Vec<String>,
}

/// Change notifier that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    state: Mutex<NotifierState>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` notifications of `url` with a transient error.
    pub fn fail_transiently(&self, url: &str, times: usize) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(url.to_string(), times);
    }

    /// Reject every notification of `url`.
    pub fn reject(&self, url: &str) {
        self.state.lock().unwrap().rejected.push(url.to_string());
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Total notifications attempted.
    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }
}

#[async_trait]
impl ChangeNotifier for RecordingNotifier {
    async fn notify_change(&self, url: &str) -> Result<(), NotifyError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(url.to_string()).or_default() += 1;

        if state.rejected.iter().any(|r| r == url) {
            return Err(NotifyError::Rejected("403 Forbidden".to_string()));
        }
        if let Some(remaining) = state.transient_failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NotifyError::Transient("connection reset".to_string()));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySitemapFetcher
// ---------------------------------------------------------------------------

/// Sitemap fetcher serving documents from a map of url -> xml.
#[derive(Debug, Default)]
pub struct MemorySitemapFetcher {
    documents: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl MemorySitemapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, xml: &str) -> Self {
        self.documents.insert(url.to_string(), xml.to_string());
        self
    }

    /// Urls fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SitemapFetcher for MemorySitemapFetcher {
    async fn fetch(&self, url: &str) -> Result<String, SamplingError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| SamplingError::Fetch {
                source_url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// StaticPopulation
// ---------------------------------------------------------------------------

/// Population source returning a fixed list of urls.
#[derive(Debug, Default)]
pub struct StaticPopulation {
    urls: Vec<String>,
}

impl StaticPopulation {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PopulationSource for StaticPopulation {
    fn describe(&self) -> String {
        "static".to_string()
    }

    async fn discover(&self, limit: Option<usize>) -> Result<Vec<String>, SamplingError> {
        let mut urls = self.urls.clone();
        if let Some(limit) = limit {
            urls.truncate(limit);
        }
        Ok(urls)
    }
}
