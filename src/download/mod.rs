//! HTTP download layer for manifest images.
//!
//! This module provides the [`HttpClient`] used for every request the
//! pipeline makes, the [`AssetFetcher`] seam for fetching a single asset
//! to a path, and the [`DownloadEngine`] which downloads a list of assets
//! concurrently under a fixed admission ceiling.
//!
//! # Features
//!
//! - Streaming downloads straight to disk
//! - At most `concurrency` transfers in flight at once
//! - Per-asset failure isolation: a failed asset leaves an empty slot
//! - Position-keyed file names (`img_1.jpg`, `img_2.jpg`, ...) so page
//!   order never depends on completion order
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use folio_core::download::{DownloadEngine, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(10)?;
//! let urls = vec!["https://example.org/iiif/p1/full/2000,/0/default.jpg".to_string()];
//! let slots = engine
//!     .download_all(Arc::new(HttpClient::new()), &urls, Path::new("./scratch"))
//!     .await;
//! println!("{} of {} downloaded", slots.downloaded(), slots.requested());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;

pub use client::HttpClient;
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, IMAGE_EXTENSION, MAX_CONCURRENCY, MIN_CONCURRENCY,
    READ_TIMEOUT_SECS,
};
pub use engine::{AssetFetcher, DownloadEngine, DownloadSlots, EngineError, slot_path};
pub use error::DownloadError;
