//! Bounded concurrent downloader for manifest page images.
//!
//! The `DownloadEngine` launches one Tokio task per asset. Each task must
//! acquire a semaphore permit before touching the network, so at most
//! `concurrency` transfers are in flight at once while the remaining tasks
//! wait for a permit to free.
//!
//! # Ordering
//!
//! Every asset is assigned its 1-based position up front and written to
//! `img_<position>.jpg`. Results are stored in a [`DownloadSlots`] vector
//! indexed by position, so the final page order never depends on which
//! transfer finishes first.
//!
//! # Failure isolation
//!
//! A failed transfer (transport error, non-2xx status, write error) is
//! logged and leaves its slot empty. It never aborts sibling tasks and
//! never makes [`DownloadEngine::download_all`] return an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::constants::{DEFAULT_CONCURRENCY, IMAGE_EXTENSION, MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::{DownloadError, HttpClient};

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Fetches one asset to one destination path.
///
/// This is the unit of work scheduled by the engine. [`HttpClient`] is the
/// production implementation; tests plug in instrumented fetchers.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetches `url` and writes it to `dest`, returning the bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

#[async_trait]
impl AssetFetcher for HttpClient {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        self.download_to_path(url, dest).await
    }
}

/// Position-indexed download results.
///
/// Slot `i` belongs to the asset at position `i + 1` among the selected
/// pages. A slot is `None` iff that asset failed to download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSlots {
    slots: Vec<Option<PathBuf>>,
}

impl DownloadSlots {
    /// Wraps a pre-filled slot vector.
    #[must_use]
    pub fn new(slots: Vec<Option<PathBuf>>) -> Self {
        Self { slots }
    }

    /// Number of assets that were requested.
    #[must_use]
    pub fn requested(&self) -> usize {
        self.slots.len()
    }

    /// Number of assets that downloaded successfully.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of assets that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.requested() - self.downloaded()
    }

    /// Raw slots in position order.
    #[must_use]
    pub fn as_slice(&self) -> &[Option<PathBuf>] {
        &self.slots
    }

    /// Consumes the slots, dropping empty ones and keeping position order.
    #[must_use]
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Returns the file path for the asset at 1-based `position`.
#[must_use]
pub fn slot_path(dest_dir: &Path, position: usize) -> PathBuf {
    dest_dir.join(format!("img_{position}.{IMAGE_EXTENSION}"))
}

/// Concurrent downloader with a fixed admission ceiling.
///
/// # Concurrency Model
///
/// - Each asset runs in its own Tokio task
/// - A semaphore permit is acquired inside the task before the transfer
/// - Permits are released automatically when the transfer ends (RAII)
/// - Each call gets its own semaphore, so concurrent pipeline runs do not
///   share a ceiling
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    concurrency: usize,
}

impl Default for DownloadEngine {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl DownloadEngine {
    /// Creates a new download engine with the specified concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    ///
    /// # Example
    ///
    /// ```
    /// use folio_core::download::DownloadEngine;
    ///
    /// let engine = DownloadEngine::new(10).unwrap();
    /// assert_eq!(engine.concurrency(), 10);
    /// ```
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download engine");
        Ok(Self { concurrency })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every URL into `dest_dir`, at most `concurrency` at a time.
    ///
    /// Returns one slot per URL in input order. Returns only after every
    /// task has finished; individual failures are logged, not returned.
    #[instrument(skip(self, fetcher, urls), fields(count = urls.len(), dest_dir = %dest_dir.display()))]
    pub async fn download_all(
        &self,
        fetcher: Arc<dyn AssetFetcher>,
        urls: &[String],
        dest_dir: &Path,
    ) -> DownloadSlots {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(urls.len());

        info!(
            assets = urls.len(),
            concurrency = self.concurrency,
            "starting downloads"
        );

        for (index, url) in urls.iter().enumerate() {
            let position = index + 1;
            let path = slot_path(dest_dir, position);
            let url = url.clone();
            let fetcher = Arc::clone(&fetcher);
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquire only fails if it were.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    warn!(position, url = %url, "admission gate closed; skipping asset");
                    return None;
                };

                match fetcher.fetch(&url, &path).await {
                    Ok(bytes) => {
                        debug!(position, bytes, path = %path.display(), "asset downloaded");
                        Some(path)
                    }
                    Err(e) => {
                        warn!(position, url = %url, error = %e, "asset download failed");
                        None
                    }
                }
            }));
        }

        let mut slots = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    warn!(position = index + 1, error = %e, "download task panicked");
                    slots.push(None);
                }
            }
        }

        let slots = DownloadSlots::new(slots);
        info!(
            requested = slots.requested(),
            downloaded = slots.downloaded(),
            failed = slots.failed(),
            "downloads complete"
        );
        slots
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_new_valid_concurrency() {
        assert_eq!(DownloadEngine::new(1).unwrap().concurrency(), 1);
        assert_eq!(DownloadEngine::new(10).unwrap().concurrency(), 10);
        assert_eq!(DownloadEngine::new(100).unwrap().concurrency(), 100);
    }

    #[test]
    fn test_engine_new_invalid_concurrency() {
        assert!(matches!(
            DownloadEngine::new(0),
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            DownloadEngine::new(101),
            Err(EngineError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_engine_default_uses_default_concurrency() {
        assert_eq!(DownloadEngine::default().concurrency(), DEFAULT_CONCURRENCY);
        assert_eq!(DEFAULT_CONCURRENCY, 10);
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_slot_path_is_one_based_position() {
        let path = slot_path(Path::new("/scratch"), 1);
        assert_eq!(path, PathBuf::from("/scratch/img_1.jpg"));
    }

    #[test]
    fn test_download_slots_counts_and_order() {
        let slots = DownloadSlots::new(vec![
            Some(PathBuf::from("img_1.jpg")),
            None,
            Some(PathBuf::from("img_3.jpg")),
        ]);
        assert_eq!(slots.requested(), 3);
        assert_eq!(slots.downloaded(), 2);
        assert_eq!(slots.failed(), 1);
        assert_eq!(
            slots.into_paths(),
            vec![PathBuf::from("img_1.jpg"), PathBuf::from("img_3.jpg")]
        );
    }

    #[tokio::test]
    async fn test_download_all_empty_input_returns_empty_slots() {
        let engine = DownloadEngine::default();
        let slots = engine
            .download_all(Arc::new(HttpClient::new()), &[], Path::new("."))
            .await;
        assert_eq!(slots.requested(), 0);
    }
}
