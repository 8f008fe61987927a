// src/error.rs
//! Fatal pipeline errors. Either variant aborts the run with no partial output.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Index feed unreachable, non-2xx, or not a parseable Atom document.
    #[error("feed fetch failed for {url}")]
    FeedFetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// At least one alert document could not be fetched.
    #[error("document fetch failed for {url}")]
    DocumentFetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl IngestError {
    pub fn url(&self) -> &str {
        match self {
            IngestError::FeedFetch { url, .. } | IngestError::DocumentFetch { url, .. } => url,
        }
    }

    /// Short label used for logs and the `stage` metric label.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::FeedFetch { .. } => "feed",
            IngestError::DocumentFetch { .. } => "document",
        }
    }
}
