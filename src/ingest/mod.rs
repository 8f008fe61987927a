// src/ingest/mod.rs
//! CAP feed ingestion pipeline:
//! feed → documents → alerts → relevant alerts → active (non-superseded) alerts.

pub mod config;
pub mod feed;
pub mod fetch;
pub mod lifecycle;
pub mod relevance;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::cap::parse::parse_documents;
use crate::error::IngestError;
use crate::ingest::config::IngestConfig;
use crate::ingest::types::{FeedResult, Fetcher};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("cap_feed_entries_total", "Entries listed by the index feed.");
        describe_counter!(
            "cap_documents_fetched_total",
            "CAP documents fetched successfully."
        );
        describe_counter!("cap_fetch_errors_total", "Feed/document fetch failures.");
        describe_counter!(
            "cap_parse_dropped_total",
            "Documents dropped because they did not parse to an alert."
        );
        describe_counter!(
            "cap_relevant_total",
            "Alerts kept by the relevance filter."
        );
        describe_counter!(
            "cap_superseded_total",
            "Alerts removed because a later Update/Cancel referenced them."
        );
        describe_counter!("cap_runs_failed_total", "Pipeline runs that ended in an error.");
        describe_histogram!("cap_fetch_ms", "Single fetch time in milliseconds.");
        describe_gauge!("cap_active_alerts", "Active alerts after the last successful run.");
        describe_gauge!(
            "cap_pipeline_last_run_ts",
            "Unix ts when the pipeline last completed successfully."
        );
    });
}

/// Normalize descriptive text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Rewrite HTML-only named entities, which XML does not define and which would
/// abort parsing. The five XML entities and numeric references are left alone;
/// a decoded `&`, `<` or `>` is re-escaped. Names HTML does not know are removed.
pub fn scrub_html_entities_for_xml(s: &str) -> String {
    static RE_NAMED: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_NAMED.get_or_init(|| regex::Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());
    re.replace_all(s, |caps: &regex::Captures| match &caps[1] {
        "amp" | "lt" | "gt" | "quot" | "apos" => caps[0].to_string(),
        _ => {
            let decoded = html_escape::decode_html_entities(&caps[0]);
            if decoded == &caps[0] {
                String::new()
            } else {
                html_escape::encode_text(&decoded).into_owned()
            }
        }
    })
    .into_owned()
}

/// Per-run knobs that do not change the pipeline's semantics.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Upper bound on in-flight document fetches; `None` dispatches all at once.
    pub max_concurrency: Option<usize>,
    /// Which `<info>` block to prefer when a document carries several languages.
    pub preferred_language: Option<String>,
}

impl From<&IngestConfig> for RunOptions {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency,
            preferred_language: cfg.preferred_language.clone(),
        }
    }
}

/// Run the whole pipeline once against `feed_url`, evaluating expiry at `now`.
///
/// Either every referenced document is fetched and the complete active set is
/// returned, or the run fails with no partial output.
pub async fn run_once(
    fetcher: &dyn Fetcher,
    feed_url: &str,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<FeedResult, IngestError> {
    ensure_metrics_described();

    match run_stages(fetcher, feed_url, opts, now).await {
        Ok(result) => {
            gauge!("cap_active_alerts").set(result.warnings.len() as f64);
            gauge!("cap_pipeline_last_run_ts").set(now.timestamp().max(0) as f64);
            Ok(result)
        }
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                stage = e.stage(),
                url = e.url(),
                error = ?e,
                "cap ingest run failed"
            );
            counter!("cap_runs_failed_total").increment(1);
            Err(e)
        }
    }
}

/// [`run_once`] with options from `cfg`; reads the wall clock for `now`.
pub async fn run_with_config(
    fetcher: &dyn Fetcher,
    cfg: &IngestConfig,
) -> Result<FeedResult, IngestError> {
    run_once(fetcher, &cfg.feed_url, &RunOptions::from(cfg), Utc::now()).await
}

async fn run_stages(
    fetcher: &dyn Fetcher,
    feed_url: &str,
    opts: &RunOptions,
    now: DateTime<Utc>,
) -> Result<FeedResult, IngestError> {
    let feed = feed::retrieve_feed(fetcher, feed_url).await?;
    let docs = fetch::fetch_documents(fetcher, &feed.entries, opts.max_concurrency).await?;

    let parsed = parse_documents(&docs, opts.preferred_language.as_deref());
    let parsed_cnt = parsed.len();

    let relevant = relevance::filter_relevant(parsed, now);
    let relevant_cnt = relevant.len();

    let (warnings, superseded_cnt) = lifecycle::resolve_lifecycle(relevant);

    // Telemetry
    counter!("cap_relevant_total").increment(relevant_cnt as u64);
    counter!("cap_superseded_total").increment(superseded_cnt as u64);

    tracing::info!(
        target: "ingest",
        entries = feed.entries.len(),
        documents = docs.len(),
        parsed = parsed_cnt,
        relevant = relevant_cnt,
        superseded = superseded_cnt,
        active = warnings.len(),
        "cap ingest run"
    );

    Ok(FeedResult {
        updated: feed.updated,
        warnings,
    })
}
