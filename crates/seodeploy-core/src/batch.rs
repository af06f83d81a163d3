//! Bounded-size batching and shard-parallel execution.
//!
//! [`group_batcher`] chunks a slice into fixed-size groups. [`parallel_map`]
//! splits a batch into contiguous shards and runs one task per shard; the
//! shard, not the element, is the unit of parallelism.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{Result, SeoError};

/// Split `items` into groups of `count`.
///
/// Produces `ceil(len / count)` groups. When `fill` is `None` the last group
/// holds only the remainder; otherwise it is padded with `fill` up to
/// `count`. A `count` of zero yields no groups.
pub fn group_batcher<T: Clone>(items: &[T], count: usize, fill: Option<T>) -> Vec<Vec<T>> {
    if count == 0 {
        return Vec::new();
    }

    items
        .chunks(count)
        .map(|chunk| {
            let mut group = chunk.to_vec();
            if let Some(pad) = &fill {
                group.resize(count, pad.clone());
            }
            group
        })
        .collect()
}

/// Split `items` into `shards` contiguous, near-equal parts.
///
/// The first `len % shards` parts get one extra element. Empty parts are
/// dropped.
pub fn split_shards<T>(items: Vec<T>, shards: usize) -> Vec<Vec<T>> {
    let shards = shards.max(1);
    let base = items.len() / shards;
    let extra = items.len() % shards;

    let mut out = Vec::with_capacity(shards);
    let mut iter = items.into_iter();
    for i in 0..shards {
        let size = base + usize::from(i < extra);
        if size == 0 {
            continue;
        }
        out.push(iter.by_ref().take(size).collect());
    }
    out
}

/// Apply `function` to `worker_count` shards of `items` concurrently and
/// concatenate the per-shard results in shard order.
///
/// With `worker_count <= 1` the function is called once with all items.
/// Shards share no state. If any shard fails (error or panic) the remaining
/// shards are aborted and the error is returned; partial results are never
/// returned.
pub async fn parallel_map<T, R, F, Fut>(
    items: Vec<T>,
    worker_count: usize,
    function: F,
) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
{
    if worker_count <= 1 {
        return function(items).await;
    }

    let function = Arc::new(function);
    let shards = split_shards(items, worker_count);
    debug!(shards = shards.len(), "dispatching shards");

    let handles: Vec<JoinHandle<Result<Vec<R>>>> = shards
        .into_iter()
        .map(|shard| {
            let function = Arc::clone(&function);
            tokio::spawn(async move { function(shard).await })
        })
        .collect();

    let mut results = Vec::new();
    let mut handles = handles.into_iter();
    while let Some(handle) = handles.next() {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(SeoError::Worker(join_err.to_string())),
        };

        match outcome {
            Ok(part) => results.extend(part),
            Err(e) => {
                warn!(error = %e, "shard failed, aborting remaining shards");
                for rest in handles.by_ref() {
                    rest.abort();
                }
                return Err(e);
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_batcher_without_fill_truncates_last_group() {
        let items: Vec<i32> = (0..10).collect();
        let groups = group_batcher(&items, 4, None);
        assert_eq!(groups, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[test]
    fn test_group_batcher_with_fill_pads_last_group() {
        let items: Vec<i32> = (0..10).collect();
        let groups = group_batcher(&items, 4, Some(99));
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[2], vec![8, 9, 99, 99]);
    }

    #[test]
    fn test_group_batcher_exact_multiple_has_no_padding() {
        let items: Vec<i32> = (0..8).collect();
        let groups = group_batcher(&items, 4, Some(99));
        assert_eq!(groups, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn test_group_batcher_edge_cases() {
        let empty: Vec<i32> = Vec::new();
        assert!(group_batcher(&empty, 3, None).is_empty());
        assert!(group_batcher(&[1, 2], 0, None).is_empty());
    }

    #[test]
    fn test_split_shards_is_contiguous_and_near_equal() {
        let shards = split_shards((0..10).collect::<Vec<_>>(), 3);
        assert_eq!(shards, vec![vec![0, 1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]]);

        let shards = split_shards(vec![1, 2], 5);
        assert_eq!(shards, vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_single_worker_matches_direct_call() {
        let items: Vec<u32> = (1..=7).collect();
        let double = |xs: Vec<u32>| async move {
            Ok::<Vec<u32>, SeoError>(xs.into_iter().map(|x| x * 2).collect())
        };

        let direct: Vec<u32> = double(items.clone()).await.expect("direct");
        let mapped = parallel_map(items, 1, double).await.expect("mapped");
        assert_eq!(direct, mapped);
    }

    #[tokio::test]
    async fn test_multi_worker_preserves_shard_order() {
        let items: Vec<u32> = (0..23).collect();
        let mapped = parallel_map(items.clone(), 4, |xs: Vec<u32>| async move {
            tokio::task::yield_now().await;
            Ok(xs.into_iter().map(|x| x + 100).collect())
        })
        .await
        .expect("mapped");

        let expected: Vec<u32> = items.into_iter().map(|x| x + 100).collect();
        assert_eq!(mapped, expected);
    }

    #[tokio::test]
    async fn test_shard_failure_is_fatal() {
        let items: Vec<u32> = (0..9).collect();
        let result = parallel_map(items, 3, |xs: Vec<u32>| async move {
            if xs.contains(&4) {
                return Err(SeoError::Worker("shard blew up".to_string()));
            }
            Ok(xs)
        })
        .await;

        match result {
            Err(SeoError::Worker(msg)) => assert_eq!(msg, "shard blew up"),
            other => panic!("expected worker error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shard_panic_surfaces_as_worker_error() {
        let result: Result<Vec<u32>> = parallel_map(vec![1, 2, 3, 4], 2, |xs: Vec<u32>| async move {
            if xs.contains(&3) {
                panic!("boom");
            }
            Ok(xs)
        })
        .await;

        assert!(matches!(result, Err(SeoError::Worker(_))));
    }
}
