//! Integration tests for the bounded download engine.
//!
//! Concurrency is observed through an instrumented fetcher; HTTP behaviour
//! is exercised against a wiremock server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use folio_core::download::slot_path;
use folio_core::{DownloadEngine, DownloadError, HttpClient};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::{InstrumentedFetcher, jpeg_bytes};

fn urls(count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| format!("https://iiif.example.org/p{n}/full/2000,/0/default.jpg"))
        .collect()
}

#[tokio::test]
async fn test_concurrency_ceiling_is_never_exceeded() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(20)));
    let engine = DownloadEngine::new(3).unwrap();

    let slots = engine
        .download_all(fetcher.clone(), &urls(25), temp.path())
        .await;

    assert_eq!(slots.downloaded(), 25);
    assert_eq!(fetcher.calls(), 25);
    assert!(fetcher.peak() <= 3, "peak in-flight was {}", fetcher.peak());
    assert!(fetcher.peak() >= 2, "transfers should overlap");
}

#[tokio::test]
async fn test_default_ceiling_is_ten() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(20)));

    let slots = DownloadEngine::default()
        .download_all(fetcher.clone(), &urls(40), temp.path())
        .await;

    assert_eq!(slots.requested(), 40);
    assert!(fetcher.peak() <= 10, "peak in-flight was {}", fetcher.peak());
}

#[tokio::test]
async fn test_failed_asset_leaves_only_its_slot_empty() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(5)).failing_on("/p2/"));

    let slots = DownloadEngine::default()
        .download_all(fetcher, &urls(4), temp.path())
        .await;

    assert_eq!(
        slots.as_slice(),
        &[
            Some(slot_path(temp.path(), 1)),
            None,
            Some(slot_path(temp.path(), 3)),
            Some(slot_path(temp.path(), 4)),
        ]
    );
    assert_eq!(slots.failed(), 1);
}

#[tokio::test]
async fn test_all_failures_still_return_every_slot() {
    let temp = TempDir::new().unwrap();
    let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(1)).failing_on("p"));

    let slots = DownloadEngine::default()
        .download_all(fetcher, &urls(3), temp.path())
        .await;

    assert_eq!(slots.requested(), 3);
    assert_eq!(slots.downloaded(), 0);
    assert!(slots.into_paths().is_empty());
}

#[tokio::test]
async fn test_slots_follow_position_not_completion_order() {
    let server = MockServer::start().await;
    for n in 1..=3u64 {
        Mock::given(method("GET"))
            .and(path(format!("/p{n}.jpg")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(jpeg_bytes(4, 4))
                    .set_delay(Duration::from_millis(90 - n * 30)),
            )
            .mount(&server)
            .await;
    }
    let temp = TempDir::new().unwrap();
    let urls: Vec<String> = (1..=3)
        .map(|n| format!("{}/p{n}.jpg", server.uri()))
        .collect();

    let slots = DownloadEngine::default()
        .download_all(Arc::new(HttpClient::new()), &urls, temp.path())
        .await;

    let expected: Vec<PathBuf> = (1..=3).map(|n| slot_path(temp.path(), n)).collect();
    assert_eq!(slots.into_paths(), expected);
    assert!(temp.path().join("img_1.jpg").exists());
}

#[tokio::test]
async fn test_http_client_writes_body_to_path() {
    let server = MockServer::start().await;
    let body = jpeg_bytes(6, 6);
    Mock::given(method("GET"))
        .and(path("/image.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("img_1.jpg");

    let written = HttpClient::new()
        .download_to_path(&format!("{}/image.jpg", server.uri()), &dest)
        .await
        .unwrap();

    assert_eq!(written, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn test_http_client_non_success_status_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("img_1.jpg");

    let result = HttpClient::new()
        .download_to_path(&format!("{}/missing.jpg", server.uri()), &dest)
        .await;

    assert!(matches!(
        result,
        Err(DownloadError::HttpStatus { status: 404, .. })
    ));
    assert!(!dest.exists(), "no file should be left for a failed asset");
}

#[tokio::test]
async fn test_http_client_fetch_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let body = HttpClient::new()
        .fetch_bytes(&format!("{}/manifest", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, b"{}");
}
