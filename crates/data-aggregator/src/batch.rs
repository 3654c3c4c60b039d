use analysis_core::{FetchResult, Payload};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs `fetch` for every distinct key with at most `limit` calls in flight.
///
/// On cancellation in-flight calls are dropped; keys that already completed keep their
/// results and the rest are reported as cancelled, so every key gets exactly one entry.
pub async fn run_bounded<P, F, Fut>(
    keys: &[String],
    limit: usize,
    cancel: &CancellationToken,
    fetch: F,
) -> BTreeMap<String, FetchResult<P>>
where
    P: Payload,
    F: Fn(String) -> Fut,
    Fut: Future<Output = FetchResult<P>>,
{
    let mut seen = BTreeSet::new();
    let unique: Vec<String> = keys.iter().filter(|k| seen.insert(k.as_str())).cloned().collect();

    let mut results = BTreeMap::new();
    let pending = stream::iter(unique.iter().cloned())
        .map(|key| {
            let call = fetch(key.clone());
            async move { (key, call.await) }
        })
        .buffer_unordered(limit.max(1));
    let mut pending = std::pin::pin!(pending);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(
                    "Batch cancelled with {}/{} keys complete",
                    results.len(),
                    unique.len()
                );
                break;
            }
            next = pending.next() => match next {
                Some((key, result)) => {
                    results.insert(key, result);
                }
                None => break,
            },
        }
    }

    for key in &unique {
        if !results.contains_key(key) {
            results.insert(key.clone(), FetchResult::cancelled(key));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::SentimentPayload;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_every_distinct_key_gets_one_result() {
        let results = run_bounded(&keys(&["AAPL", "MSFT", "AAPL"]), 2, &CancellationToken::new(), |key| async move {
            FetchResult::success(&key, "stub", SentimentPayload::new(0.2, 0.5, 1))
        })
        .await;

        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| r.is_valid()));
    }

    #[tokio::test]
    async fn test_pre_cancelled_batch_reports_all_keys_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = run_bounded(&keys(&["AAPL", "MSFT"]), 4, &cancel, |key| async move {
            FetchResult::success(&key, "stub", SentimentPayload::new(0.2, 0.5, 1))
        })
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results["MSFT"].entity_key(), "MSFT");
        assert!(results.values().all(|r| !r.is_valid()));
    }
}
