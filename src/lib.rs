// src/lib.rs
// Public library surface for the polling binary and integration tests.

pub mod cap;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod snapshot;

// ---- Re-exports for stable public API ----
pub use crate::cap::Alert;
pub use crate::error::IngestError;
pub use crate::ingest::config::IngestConfig;
pub use crate::ingest::fetch::{FixtureFetcher, HttpFetcher};
pub use crate::ingest::types::{FeedResult, Fetcher};
pub use crate::ingest::{run_once, run_with_config, RunOptions};
pub use crate::snapshot::LatestFeed;
