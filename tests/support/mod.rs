//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use folio_core::{AssetFetcher, DownloadError};
use image::{ImageFormat, Rgb, RgbImage};
use wiremock::MockServer;

/// Thumbnail size segment used in test manifests.
pub const THUMB: &str = "/full/!200,200/0/default.jpg";

/// Encodes a solid-colour JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([120, 80, 40]))
        .write_to(&mut bytes, ImageFormat::Jpeg)
        .unwrap();
    bytes.into_inner()
}

/// Image request path that the resolver produces for page `n`.
pub fn full_image_path(n: usize) -> String {
    format!("/iiif/p{n}/full/2000,/0/default.jpg")
}

/// Manifest JSON with one canvas per page, each pointing at `server`.
pub fn manifest_json(server: &MockServer, pages: usize) -> String {
    let canvases: Vec<String> = (1..=pages)
        .map(|n| {
            format!(
                r#"{{"images":[{{"resource":{{"@id":"{}/iiif/p{n}{THUMB}"}}}}]}}"#,
                server.uri()
            )
        })
        .collect();
    format!(r#"{{"sequences":[{{"canvases":[{}]}}]}}"#, canvases.join(","))
}

/// Number of requests `server` received for `path`.
pub async fn request_count(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == path)
        .count()
}

/// Fetcher that records how many fetches run at once.
///
/// Each fetch sleeps for `delay`, then writes a small JPEG unless the URL
/// contains `fail_marker`.
pub struct InstrumentedFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    delay: Duration,
    fail_marker: Option<String>,
    seen: Mutex<Vec<String>>,
}

impl InstrumentedFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            delay,
            fail_marker: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for InstrumentedFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        let result = if self
            .fail_marker
            .as_deref()
            .is_some_and(|marker| url.contains(marker))
        {
            Err(DownloadError::http_status(url, 500))
        } else {
            let bytes = jpeg_bytes(4, 4);
            tokio::fs::write(dest, &bytes)
                .await
                .map(|()| bytes.len() as u64)
                .map_err(|e| DownloadError::io(dest, e))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
