// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cap::Alert;

/// One `<entry>` of the index feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub reference: String, // URL of the CAP document
    pub id: Option<String>,
    pub title: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

/// Parsed index feed: its `updated` stamp plus entries in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub updated: DateTime<Utc>,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub reference: String,
    pub body: String,
}

/// Terminal output of one pipeline run. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedResult {
    pub updated: DateTime<Utc>,
    pub warnings: Vec<Alert>,
}

/// Transport seam: returns the body at `url` or an error for any failure,
/// including non-success HTTP status.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}
