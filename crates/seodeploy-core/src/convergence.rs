//! Convergence polling across two asynchronously re-crawled environments.
//!
//! For every sample path, a change notification is sent to production and
//! staging. Each batch is then polled per environment: a FIFO queue is
//! drained, re-enqueueing paths whose crawl-status record predates the run's
//! start time, until every path has resolved or become invalid. A
//! starvation guard aborts the poll if one path keeps coming back stale.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::batch::{group_batcher, parallel_map};
use crate::domain::{
    ConvergenceRecord, Environment, PagePair, PageSnapshot, Result, SamplePath, SeoError,
    SnapshotError,
};
use crate::obs;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Failure of a single change-notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// Timeout or connection failure; worth retrying.
    #[error("transient: {0}")]
    Transient(String),

    /// The service answered with an error status; not retried.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Asks the crawl-status service to re-index a URL.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn notify_change(&self, url: &str) -> std::result::Result<(), NotifyError>;
}

/// Latest stored crawl of one path.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub checked_at: DateTime<Utc>,
    pub snapshot: PageSnapshot,
}

/// Reads the latest crawl-status record for a path.
///
/// `Ok(None)` means the service had no usable record. Errors are reported
/// per path and never abort a poll.
#[async_trait]
pub trait CrawlStatusSource: Send + Sync {
    async fn fetch_status(
        &self,
        path: &SamplePath,
    ) -> std::result::Result<Option<StatusRecord>, SnapshotError>;
}

/// One environment under test.
#[derive(Clone)]
pub struct Target {
    pub environment: Environment,
    /// Base URL that sample paths are joined onto.
    pub host: String,
    pub notifier: Arc<dyn ChangeNotifier>,
    pub status: Arc<dyn CrawlStatusSource>,
}

impl Target {
    pub fn url_for(&self, path: &SamplePath) -> String {
        join_url(&self.host, path.as_str())
    }
}

/// Join a host and a path without doubling or dropping the separator.
pub fn join_url(host: &str, path: &str) -> String {
    match (host.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", host.trim_end_matches('/'), path),
        (false, false) => format!("{host}/{path}"),
        _ => format!("{host}{path}"),
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Paths per convergence batch.
    pub batch_size: usize,
    /// Shards polled concurrently per batch and environment.
    pub max_workers: usize,
    /// Pause between batches.
    pub batch_wait: Duration,
    pub notify_attempts: usize,
    /// Backoff unit; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Pops of the same stale path allowed before giving up.
    pub starvation_limit: usize,
    /// Pause before re-polling a stale path.
    pub requeue_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_workers: 1,
            batch_wait: Duration::from_secs(10),
            notify_attempts: 3,
            retry_backoff: Duration::from_secs(10),
            starvation_limit: 5,
            requeue_delay: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Notify a single URL, retrying transient failures with linear backoff.
pub async fn notify_with_retry(
    notifier: &dyn ChangeNotifier,
    url: &str,
    attempts: usize,
    backoff: Duration,
) -> std::result::Result<(), NotifyError> {
    let attempts = attempts.max(1);
    let mut last = NotifyError::Transient("no attempt made".to_string());

    for attempt in 1..=attempts {
        match notifier.notify_change(url).await {
            Ok(()) => return Ok(()),
            Err(NotifyError::Rejected(reason)) => {
                error!(url = %url, reason = %reason, "change notification rejected");
                return Err(NotifyError::Rejected(reason));
            }
            Err(err) => {
                warn!(url = %url, attempt = attempt, error = %err, "change notification failed");
                last = err;
                if attempt < attempts {
                    tokio::time::sleep(backoff * attempt as u32).await;
                }
            }
        }
    }

    Err(last)
}

/// Notify every path of `sample` in `target`.
///
/// Logs the share of URLs notified. Any URL that could not be notified
/// fails the whole trigger phase with [`SeoError::NotificationFailed`].
pub async fn trigger_environment(
    target: &Target,
    sample: &[SamplePath],
    settings: &PollSettings,
) -> Result<()> {
    let mut failed: Vec<(String, NotifyError)> = Vec::new();

    for path in sample {
        let url = target.url_for(path);
        if let Err(err) = notify_with_retry(
            target.notifier.as_ref(),
            &url,
            settings.notify_attempts,
            settings.retry_backoff,
        )
        .await
        {
            failed.push((url, err));
        }
    }

    let total = sample.len();
    if total > 0 {
        let sent = (total - failed.len()) as f64 / total as f64 * 100.0;
        info!(
            environment = %target.environment,
            "{:.2}% of {} URLs successfully sent",
            sent,
            target.environment
        );
    }

    for (url, err) in &failed {
        error!(environment = %target.environment, url = %url, error = %err, "url ping error");
    }

    match failed.into_iter().next() {
        None => Ok(()),
        Some((url, err)) => Err(SeoError::NotificationFailed {
            url,
            reason: err.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Drain one shard's poll queue.
///
/// Paths are polled strictly sequentially. A path resolves when its record
/// was checked after `started_at`; stale paths go to the back of the queue.
/// The guard follows the oldest still-pending path seen at the head and
/// fails once it has been popped more than `starvation_limit` times.
pub async fn poll_shard(
    status: &dyn CrawlStatusSource,
    environment: Environment,
    paths: Vec<SamplePath>,
    started_at: DateTime<Utc>,
    settings: &PollSettings,
) -> Result<Vec<ConvergenceRecord>> {
    let mut queue: VecDeque<SamplePath> = paths.into();
    let mut records = Vec::with_capacity(queue.len());
    let mut tracked: Option<(SamplePath, usize)> = None;

    while let Some(path) = queue.pop_front() {
        let count = match tracked.as_mut() {
            Some((head, count)) if *head == path => {
                *count += 1;
                *count
            }
            Some((head, _)) if queue.contains(head) => 0,
            _ => {
                tracked = Some((path.clone(), 1));
                1
            }
        };

        if count > settings.starvation_limit {
            return Err(SeoError::ConvergenceStarvation {
                environment,
                path: path.to_string(),
                attempts: count - 1,
            });
        }

        match status.fetch_status(&path).await {
            Ok(Some(record)) if record.checked_at > started_at => {
                debug!(environment = %environment, path = %path, "resolved");
                records.push(ConvergenceRecord::resolved(path, record.snapshot));
            }
            Ok(Some(record)) => {
                debug!(
                    environment = %environment,
                    path = %path,
                    checked_at = %record.checked_at,
                    "stale record, requeueing"
                );
                if !settings.requeue_delay.is_zero() {
                    tokio::time::sleep(settings.requeue_delay).await;
                }
                queue.push_back(path);
            }
            Ok(None) => {
                warn!(environment = %environment, path = %path, "missing crawl-status record");
                records.push(ConvergenceRecord::invalid(path, SnapshotError::Missing));
            }
            Err(err) => {
                warn!(environment = %environment, path = %path, error = %err, "crawl-status query failed");
                records.push(ConvergenceRecord::invalid(path, err));
            }
        }
    }

    Ok(records)
}

/// Poll one batch in one environment, sharded over `max_workers` tasks.
pub async fn poll_environment(
    target: &Target,
    batch: Vec<SamplePath>,
    started_at: DateTime<Utc>,
    settings: &PollSettings,
) -> Result<Vec<ConvergenceRecord>> {
    let status = Arc::clone(&target.status);
    let environment = target.environment;
    let shard_settings = settings.clone();

    parallel_map(batch, settings.max_workers, move |shard| {
        let status = Arc::clone(&status);
        let settings = shard_settings.clone();
        async move { poll_shard(status.as_ref(), environment, shard, started_at, &settings).await }
    })
    .await
}

/// Join production and staging records into pairs, in sample order.
///
/// Errors on either side produce an errored pair naming the environment. A
/// path without a record on one side is reported as unpaired.
pub fn pair_records(
    sample: &[SamplePath],
    production: Vec<ConvergenceRecord>,
    staging: Vec<ConvergenceRecord>,
) -> Vec<PagePair> {
    let mut prod: HashMap<SamplePath, ConvergenceRecord> =
        production.into_iter().map(|r| (r.path.clone(), r)).collect();
    let mut stage: HashMap<SamplePath, ConvergenceRecord> =
        staging.into_iter().map(|r| (r.path.clone(), r)).collect();

    sample
        .iter()
        .map(|path| {
            let (prod_snap, prod_err) = split_record(prod.remove(path), Environment::Production);
            let (stage_snap, stage_err) = split_record(stage.remove(path), Environment::Staging);

            let errors: Vec<String> = [prod_err, stage_err].into_iter().flatten().collect();
            let error = (!errors.is_empty()).then(|| errors.join("; "));

            PagePair {
                path: path.clone(),
                production: prod_snap,
                staging: stage_snap,
                error,
            }
        })
        .collect()
}

fn split_record(
    record: Option<ConvergenceRecord>,
    environment: Environment,
) -> (Option<PageSnapshot>, Option<String>) {
    match record {
        None => (
            None,
            Some(format!(
                "{environment}: {}",
                SnapshotError::Unpaired { environment }
            )),
        ),
        Some(ConvergenceRecord {
            error: Some(err), ..
        }) => (None, Some(format!("{environment}: {err}"))),
        Some(ConvergenceRecord {
            snapshot: Some(snap),
            ..
        }) => (Some(snap), None),
        Some(ConvergenceRecord { .. }) => (
            None,
            Some(format!("{environment}: {}", SnapshotError::Missing)),
        ),
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Triggers re-indexing in both environments and waits for fresh data.
pub struct ConvergencePoller {
    pub production: Target,
    pub staging: Target,
    pub settings: PollSettings,
}

impl ConvergencePoller {
    pub fn new(production: Target, staging: Target, settings: PollSettings) -> Self {
        Self {
            production,
            staging,
            settings,
        }
    }

    /// Run the full trigger-then-poll cycle for `sample`.
    pub async fn run(&self, sample: &[SamplePath]) -> Result<Vec<PagePair>> {
        self.run_since(sample, Utc::now()).await
    }

    /// Like [`run`](Self::run) with an explicit start time; records checked
    /// at or before `started_at` are stale.
    pub async fn run_since(
        &self,
        sample: &[SamplePath],
        started_at: DateTime<Utc>,
    ) -> Result<Vec<PagePair>> {
        let batches = group_batcher(sample, self.settings.batch_size.max(1), None);

        for batch in &batches {
            trigger_environment(&self.production, batch, &self.settings).await?;
            trigger_environment(&self.staging, batch, &self.settings).await?;
        }

        let mut prod_records = Vec::with_capacity(sample.len());
        let mut stage_records = Vec::with_capacity(sample.len());

        for (index, batch) in batches.iter().enumerate() {
            prod_records.extend(
                poll_environment(&self.production, batch.clone(), started_at, &self.settings)
                    .await?,
            );
            stage_records.extend(
                poll_environment(&self.staging, batch.clone(), started_at, &self.settings)
                    .await?,
            );

            obs::emit_batch_finished(index + 1, batches.len(), batch.len());

            if index + 1 < batches.len() && !self.settings.batch_wait.is_zero() {
                tokio::time::sleep(self.settings.batch_wait).await;
            }
        }

        Ok(pair_records(sample, prod_records, stage_records))
    }
}
