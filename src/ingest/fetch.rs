// src/ingest/fetch.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use futures::{stream, StreamExt, TryStreamExt};
use metrics::{counter, histogram};
use reqwest::header::ACCEPT;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::IngestError;
use crate::ingest::config::IngestConfig;
use crate::ingest::types::{FeedEntry, Fetcher, RawDocument};

const ACCEPT_XML: &str =
    "application/atom+xml, application/cap+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.1";

/// Plain GET over a shared `reqwest` client. Non-2xx responses are errors.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }

    pub fn from_config(cfg: &IngestConfig) -> Result<Self> {
        Self::new(
            Duration::from_secs(cfg.request_timeout_secs),
            &cfg.user_agent,
        )
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_XML)
            .send()
            .await
            .with_context(|| format!("http get {url}"))?
            .error_for_status()
            .with_context(|| format!("http status for {url}"))?;
        resp.text()
            .await
            .with_context(|| format!("http .text() for {url}"))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// In-memory URL → body map for tests and offline replays of a captured feed.
/// Unknown URLs fail like an unreachable host.
#[derive(Debug, Clone, Default)]
pub struct FixtureFetcher {
    bodies: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<String>) {
        self.bodies.insert(url.into(), body.into());
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        match self.bodies.get(url) {
            Some(body) => Ok(body.clone()),
            None => bail!("no fixture registered for {url}"),
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Stage 2: fetch every referenced document concurrently.
///
/// Fail-fast: the first failed fetch aborts the stage and drops the rest.
/// `max_concurrency` bounds in-flight requests; output keeps feed order either way.
pub async fn fetch_documents(
    fetcher: &dyn Fetcher,
    entries: &[FeedEntry],
    max_concurrency: Option<usize>,
) -> Result<Vec<RawDocument>, IngestError> {
    let jobs = entries
        .iter()
        .map(|e| fetch_document(fetcher, e.reference.clone()));

    match max_concurrency {
        Some(limit) if limit > 0 => stream::iter(jobs).buffered(limit).try_collect().await,
        _ => try_join_all(jobs).await,
    }
}

async fn fetch_document(
    fetcher: &dyn Fetcher,
    reference: String,
) -> Result<RawDocument, IngestError> {
    let t0 = std::time::Instant::now();
    let res = fetcher.fetch(&reference).await;
    histogram!("cap_fetch_ms", "kind" => "document")
        .record(t0.elapsed().as_secs_f64() * 1_000.0);

    match res {
        Ok(body) => {
            counter!("cap_documents_fetched_total").increment(1);
            Ok(RawDocument { reference, body })
        }
        Err(e) => {
            tracing::debug!(
                target: "ingest",
                reference = %reference,
                fetcher = fetcher.name(),
                error = ?e,
                "document fetch failed; aborting run"
            );
            counter!("cap_fetch_errors_total", "kind" => "document").increment(1);
            Err(IngestError::DocumentFetch {
                url: reference,
                source: e,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry(url: &str) -> FeedEntry {
        FeedEntry {
            reference: url.to_string(),
            id: None,
            title: None,
            updated: None,
        }
    }

    /// Tracks how many fetches are in flight at once.
    struct GaugeFetcher {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for GaugeFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("body of {url}"))
        }

        fn name(&self) -> &'static str {
            "gauge"
        }
    }

    #[tokio::test]
    async fn fetches_all_in_feed_order() {
        let f = FixtureFetcher::new()
            .with("u1", "one")
            .with("u2", "two")
            .with("u3", "three");
        let docs = fetch_documents(&f, &[entry("u1"), entry("u2"), entry("u3")], None)
            .await
            .unwrap();
        let bodies: Vec<&str> = docs.iter().map(|d| d.body.as_str()).collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
        assert_eq!(docs[1].reference, "u2");
    }

    #[tokio::test]
    async fn one_failure_fails_the_stage() {
        let f = FixtureFetcher::new().with("u1", "one").with("u3", "three");
        let err = fetch_documents(&f, &[entry("u1"), entry("u2"), entry("u3")], Some(2))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::DocumentFetch { ref url, .. } if url == "u2"));
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let peak = Arc::new(AtomicUsize::new(0));
        let f = GaugeFetcher {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        };
        let entries: Vec<FeedEntry> = (0..8).map(|i| entry(&format!("u{i}"))).collect();
        let docs = fetch_documents(&f, &entries, Some(3)).await.unwrap();
        assert_eq!(docs.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn unbounded_dispatches_everything_at_once() {
        let peak = Arc::new(AtomicUsize::new(0));
        let f = GaugeFetcher {
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: peak.clone(),
        };
        let entries: Vec<FeedEntry> = (0..5).map(|i| entry(&format!("u{i}"))).collect();
        fetch_documents(&f, &entries, None).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn empty_reference_list_is_fine() {
        let docs = fetch_documents(&FixtureFetcher::new(), &[], None).await.unwrap();
        assert!(docs.is_empty());
    }
}
