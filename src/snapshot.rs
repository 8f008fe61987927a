// src/snapshot.rs
//! Last-known-good result holder for callers that poll the pipeline.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::IngestError;
use crate::ingest::types::FeedResult;

/// Keeps the most recent successful [`FeedResult`]. A failed run leaves the
/// previous result in place so a display never falls back to an empty picture.
#[derive(Clone, Default)]
pub struct LatestFeed {
    inner: Arc<RwLock<Option<Arc<FeedResult>>>>,
}

impl LatestFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<FeedResult>> {
        // Writers only swap a whole Arc, so a poisoned value is still consistent.
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn store(&self, result: FeedResult) -> Arc<FeedResult> {
        let shared = Arc::new(result);
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(shared.clone());
        shared
    }

    /// Store on success; on failure log and keep the previous value.
    /// Returns whatever is current afterwards.
    pub fn apply(&self, outcome: Result<FeedResult, IngestError>) -> Option<Arc<FeedResult>> {
        match outcome {
            Ok(result) => Some(self.store(result)),
            Err(e) => {
                let current = self.get();
                tracing::debug!(
                    target: "ingest",
                    error = ?e,
                    retained = current.is_some(),
                    "run failed; keeping last good result"
                );
                current
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn result(n: i64) -> FeedResult {
        FeedResult {
            updated: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
            warnings: vec![],
        }
    }

    fn failure() -> IngestError {
        IngestError::FeedFetch {
            url: "https://feed.test".into(),
            source: anyhow::anyhow!("connection refused"),
        }
    }

    #[test]
    fn failure_before_any_success_yields_none() {
        let latest = LatestFeed::new();
        assert!(latest.apply(Err(failure())).is_none());
    }

    #[test]
    fn failure_keeps_previous_success() {
        let latest = LatestFeed::new();
        latest.apply(Ok(result(1)));
        let kept = latest.apply(Err(failure())).unwrap();
        assert_eq!(kept.updated, result(1).updated);

        latest.apply(Ok(result(2)));
        assert_eq!(latest.get().unwrap().updated, result(2).updated);
    }

    #[test]
    fn clones_share_state() {
        let a = LatestFeed::new();
        let b = a.clone();
        a.store(result(5));
        assert!(b.get().is_some());
    }

    #[test]
    fn poisoned_lock_keeps_serving_and_storing() {
        let latest = LatestFeed::new();
        latest.store(result(1));

        let inner = latest.inner.clone();
        let _ = std::thread::spawn(move || {
            let _guard = inner.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(latest.inner.is_poisoned());

        assert_eq!(latest.get().unwrap().updated, result(1).updated);
        latest.store(result(2));
        assert_eq!(latest.get().unwrap().updated, result(2).updated);
    }
}
