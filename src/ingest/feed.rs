// src/ingest/feed.rs
//! Atom index feed: one CAP document reference per `<entry>`.

use anyhow::{anyhow, Context, Result};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::cap::parse_timestamp;
use crate::error::IngestError;
use crate::ingest::scrub_html_entities_for_xml;
use crate::ingest::types::{Feed, FeedEntry, Fetcher};

pub const CAP_MEDIA_TYPE: &str = "application/cap+xml";

#[derive(Debug, Deserialize)]
struct AtomFeed {
    updated: String,
    // One <entry> and many <entry> both land here.
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<AtomText>,
    updated: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@type")]
    media_type: Option<String>,
}

/// Parse an Atom index body. Entries without a usable reference are skipped.
pub fn parse_feed(body: &str) -> Result<Feed> {
    let xml_clean = scrub_html_entities_for_xml(body);
    let atom: AtomFeed = from_str(&xml_clean).context("parsing atom feed xml")?;
    let updated = parse_timestamp(&atom.updated)
        .ok_or_else(|| anyhow!("feed <updated> is not RFC 3339: {:?}", atom.updated))?;

    let mut entries = Vec::with_capacity(atom.entries.len());
    for (idx, e) in atom.entries.into_iter().enumerate() {
        let Some(reference) = entry_reference(&e) else {
            tracing::warn!(
                target: "ingest",
                entry = idx,
                id = e.id.as_deref().unwrap_or_default(),
                "feed entry has no CAP reference; skipping"
            );
            continue;
        };
        entries.push(FeedEntry {
            reference,
            id: e.id.map(|s| s.trim().to_string()),
            title: e
                .title
                .map(|t| crate::ingest::normalize_text(&t.value))
                .filter(|t| !t.is_empty()),
            updated: e.updated.as_deref().and_then(parse_timestamp),
        });
    }

    Ok(Feed { updated, entries })
}

/// CAP-typed link first, then any link, then an http(s) entry id.
fn entry_reference(e: &AtomEntry) -> Option<String> {
    let href_of = |l: &AtomLink| {
        l.href
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
    };

    let cap_link = e
        .links
        .iter()
        .filter(|l| {
            l.media_type
                .as_deref()
                .is_some_and(|t| t.trim().eq_ignore_ascii_case(CAP_MEDIA_TYPE))
        })
        .find_map(href_of);

    cap_link
        .or_else(|| e.links.iter().find_map(href_of))
        .or_else(|| {
            e.id.as_deref()
                .map(str::trim)
                .filter(|id| id.starts_with("http://") || id.starts_with("https://"))
                .map(str::to_string)
        })
}

/// Stage 1: fetch and parse the index feed. Any failure is fatal for the run.
pub async fn retrieve_feed(fetcher: &dyn Fetcher, url: &str) -> Result<Feed, IngestError> {
    let t0 = std::time::Instant::now();
    let outcome = match fetcher.fetch(url).await {
        Ok(body) => parse_feed(&body),
        Err(e) => Err(e),
    };
    histogram!("cap_fetch_ms", "kind" => "feed").record(t0.elapsed().as_secs_f64() * 1_000.0);

    match outcome {
        Ok(feed) => {
            counter!("cap_feed_entries_total").increment(feed.entries.len() as u64);
            tracing::debug!(
                target: "ingest",
                url,
                fetcher = fetcher.name(),
                entries = feed.entries.len(),
                "feed retrieved"
            );
            Ok(feed)
        }
        Err(source) => {
            counter!("cap_fetch_errors_total", "kind" => "feed").increment(1);
            Err(IngestError::FeedFetch {
                url: url.to_string(),
                source,
            })
        }
    }
}
