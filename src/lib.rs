//! Folio Core Library
//!
//! This library turns a remotely hosted IIIF-style manifest describing a
//! multi-page scanned work into a single PDF, optionally prefixed with a
//! metadata header page scraped from the source catalog.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`pages`] - Page range selection (`"0,2,5-9"` → inclusion predicate)
//! - [`manifest`] - Manifest model and image URL resolution
//! - [`download`] - HTTP client and bounded concurrent downloader
//! - [`header`] - Header artifact, header task and page rendering
//! - [`assemble`] - Appending downloaded images as PDF pages
//! - [`catalog`] - Source-specific catalog collaborators (Colenda, Folger)
//! - [`pipeline`] - End-to-end `build_document` orchestration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assemble;
pub mod catalog;
pub mod download;
pub mod header;
pub mod manifest;
pub mod pages;
pub mod pipeline;
mod user_agent;

// Re-export commonly used types
pub use assemble::{AssemblyError, assemble_images};
pub use catalog::{ColendaCatalog, FolgerCatalog};
pub use download::{
    AssetFetcher, DEFAULT_CONCURRENCY, DownloadEngine, DownloadError, DownloadSlots, EngineError,
    HttpClient,
};
pub use header::{
    HeaderArtifact, HeaderError, HeaderSource, HeaderTask, Property, StaticHeaderSource,
    render_header_page, run_header_task,
};
pub use manifest::{ManifestError, ManifestSource, resolve_image_urls, upscale_image_id};
pub use pages::{PageRange, PageSelection, RangeSpecError};
pub use pipeline::{BuildReport, Pipeline, PipelineError, PipelineOptions};
