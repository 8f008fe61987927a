//! Polling caller for the CAP ingest pipeline.
//! Runs the pipeline on `poll_interval_secs`, keeps the last good result and
//! prints the active set as JSON. `--once` runs a single cycle and exits.

use anyhow::{Context, Result};
use cap_alert_ingest::ingest::config::load_config_default;
use cap_alert_ingest::{run_with_config, HttpFetcher, LatestFeed};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; JSON lines when CAP_LOG_JSON=1.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));
    let json = std::env::var("CAP_LOG_JSON").ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default().context("loading ingest config")?;
    let once = std::env::args().skip(1).any(|a| a == "--once");

    if let Ok(addr) = std::env::var("CAP_METRICS_ADDR") {
        let addr = addr
            .parse::<std::net::SocketAddr>()
            .context("CAP_METRICS_ADDR must be host:port")?;
        cap_alert_ingest::metrics::install_exporter(addr)?;
        tracing::info!(target: "ingest", %addr, "prometheus exporter listening");
    }

    let fetcher = HttpFetcher::from_config(&cfg)?;
    let latest = LatestFeed::new();

    tracing::info!(
        target: "ingest",
        feed = %cfg.feed_url,
        interval_secs = cfg.poll_interval_secs,
        once,
        "cap poller starting"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.poll_interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        let outcome = run_with_config(&fetcher, &cfg).await;
        let failed = outcome.is_err();
        let current = latest.apply(outcome);

        if let Some(result) = current.as_deref() {
            println!("{}", serde_json::to_string(result)?);
        }

        if once {
            if failed {
                anyhow::bail!("ingest run failed");
            }
            return Ok(());
        }
    }
}
