// tests/http_fetcher.rs
use cap_alert_ingest::ingest::{run_once, RunOptions};
use cap_alert_ingest::{Fetcher, HttpFetcher, IngestError};
use chrono::{TimeZone, Utc};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CAP_ALERT: &str = include_str!("fixtures/cap_alert_1.xml");
const CAP_UPDATE: &str = include_str!("fixtures/cap_update_2.xml");

fn feed_for(base: &str, docs: &[&str]) -> String {
    let entries: String = docs
        .iter()
        .map(|d| {
            format!(
                r#"  <entry><id>{d}</id><link type="application/cap+xml" href="{base}/cap/{d}.xml"/></entry>
"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <updated>2024-06-01T10:00:00Z</updated>
{entries}</feed>"#
    )
}

async fn mount(server: &MockServer, at: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5), "cap-alert-ingest-tests").expect("client")
}

#[tokio::test]
async fn http_pipeline_resolves_update() {
    let server = MockServer::start().await;
    mount(&server, "/feed", 200, &feed_for(&server.uri(), &["1", "2"])).await;
    mount(&server, "/cap/1.xml", 200, CAP_ALERT).await;
    mount(&server, "/cap/2.xml", 200, CAP_UPDATE).await;

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let out = run_once(
        &fetcher(),
        &format!("{}/feed", server.uri()),
        &RunOptions::default(),
        now,
    )
    .await
    .expect("run ok");

    assert_eq!(out.warnings.len(), 1);
    assert_eq!(out.warnings[0].identifier, "urn:oid:2.49.0.1.203.0.2");
}

#[tokio::test]
async fn server_error_on_a_document_is_fatal() {
    let server = MockServer::start().await;
    mount(&server, "/feed", 200, &feed_for(&server.uri(), &["1", "2", "3"])).await;
    mount(&server, "/cap/1.xml", 200, CAP_ALERT).await;
    mount(&server, "/cap/2.xml", 503, "busy").await;
    mount(&server, "/cap/3.xml", 200, CAP_UPDATE).await;

    let err = run_once(
        &fetcher(),
        &format!("{}/feed", server.uri()),
        &RunOptions::default(),
        Utc::now(),
    )
    .await
    .unwrap_err();

    match err {
        IngestError::DocumentFetch { url, .. } => assert!(url.ends_with("/cap/2.xml")),
        other => panic!("expected DocumentFetch, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_feed_is_a_feed_error() {
    let server = MockServer::start().await;
    mount(&server, "/feed", 404, "not here").await;

    let err = run_once(
        &fetcher(),
        &format!("{}/feed", server.uri()),
        &RunOptions::default(),
        Utc::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, IngestError::FeedFetch { .. }));
}

#[tokio::test]
async fn fetch_returns_body_text() {
    let server = MockServer::start().await;
    mount(&server, "/cap/1.xml", 200, CAP_ALERT).await;

    let body = fetcher()
        .fetch(&format!("{}/cap/1.xml", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, CAP_ALERT);
}
