// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PATH: &str = "INGEST_CONFIG_PATH";
const ENV_FEED_URL: &str = "CAP_FEED_URL";

fn default_timeout_secs() -> u64 {
    10
}
fn default_poll_interval_secs() -> u64 {
    300
}
fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Atom index listing the CAP documents.
    pub feed_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Cap on concurrent document fetches; unset = all at once.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// e.g. "en" picks `en-GB` over the first `<info>` block.
    #[serde(default)]
    pub preferred_language: Option<String>,
    /// Only read by the polling binary; the library never schedules itself.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl IngestConfig {
    pub fn with_feed_url(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
            request_timeout_secs: default_timeout_secs(),
            max_concurrency: None,
            user_agent: default_user_agent(),
            preferred_language: None,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }

    fn sanitize(mut self) -> Result<Self> {
        self.feed_url = self.feed_url.trim().to_string();
        if self.feed_url.is_empty() {
            return Err(anyhow!("feed_url must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_timeout_secs();
        }
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = default_poll_interval_secs();
        }
        // 0 would stall the bounded stream; treat as "no cap".
        if self.max_concurrency == Some(0) {
            self.max_concurrency = None;
        }
        self.preferred_language = self
            .preferred_language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        Ok(self)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) config/ingest.json
///
/// `$CAP_FEED_URL` overrides the file's `feed_url`, or alone yields a default config.
pub fn load_config_default() -> Result<IngestConfig> {
    let env_url = std::env::var(ENV_FEED_URL)
        .ok()
        .filter(|u| !u.trim().is_empty());

    let from_file = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("INGEST_CONFIG_PATH points to non-existent path"));
        }
        Some(load_config_from(&pb)?)
    } else {
        ["config/ingest.toml", "config/ingest.json"]
            .into_iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .map(|p| load_config_from(&p))
            .transpose()?
    };

    match (from_file, env_url) {
        (Some(mut cfg), Some(url)) => {
            cfg.feed_url = url;
            cfg.sanitize()
        }
        (Some(cfg), None) => Ok(cfg),
        (None, Some(url)) => IngestConfig::with_feed_url(url).sanitize(),
        (None, None) => Err(anyhow!(
            "no ingest config found; set {ENV_PATH} or {ENV_FEED_URL}"
        )),
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || !s.trim_start().starts_with('{');
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported ingest config format"))
}

fn parse_toml(s: &str) -> Result<IngestConfig> {
    let v: IngestConfig = toml::from_str(s)?;
    v.sanitize()
}

fn parse_json(s: &str) -> Result<IngestConfig> {
    let v: IngestConfig = serde_json::from_str(s)?;
    v.sanitize()
}
