//! Header page: catalog metadata prepended to the assembled document.
//!
//! The header is produced independently of image downloads:
//!
//! - [`HeaderSource`] - Async trait that acquires a [`HeaderArtifact`]
//!   (title, properties, links, optional manifest URL) for a catalog ID
//! - [`HeaderTask`] - Spawned task that acquires then renders the header
//!   to the output path and signals completion exactly once
//! - [`render_header_page`] - Typesets an artifact as a standalone PDF
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use folio_core::header::{HeaderArtifact, StaticHeaderSource, run_header_task};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let artifact = HeaderArtifact::new("81431-p3hk28", "Book of Hours");
//! let task = run_header_task(
//!     Arc::new(StaticHeaderSource::new(artifact)),
//!     "81431-p3hk28",
//!     "81431-p3hk28.pdf",
//! );
//! task.wait().await?;
//! # Ok(())
//! # }
//! ```

mod render;
mod task;

pub use render::{render_header_page, write_header_file};
pub use task::{HeaderTask, run_header_task};

use std::fmt::Display;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::download::DownloadError;

/// One key/value line of catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Label, e.g. `Date:`.
    pub key: String,
    /// Value text.
    pub value: String,
}

impl Property {
    /// Creates a property.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Catalog metadata rendered as the first page(s) of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderArtifact {
    /// Catalog identifier the metadata belongs to.
    pub catalog_id: String,
    /// Work title.
    pub title: String,
    /// Ordered key/value properties.
    pub properties: Vec<Property>,
    /// Ordered related external links.
    pub links: Vec<String>,
    /// Manifest URL discovered while scraping, for sources that publish it.
    pub manifest_url: Option<String>,
}

impl HeaderArtifact {
    /// Creates an artifact with a title and no properties or links.
    #[must_use]
    pub fn new(catalog_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Errors produced while acquiring or rendering the header.
///
/// Any of these is fatal to the pipeline run.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The catalog page could not be fetched.
    #[error("error getting header for {catalog_id}: {source}")]
    Fetch {
        /// Catalog identifier.
        catalog_id: String,
        /// The underlying request error.
        #[source]
        source: DownloadError,
    },

    /// The catalog page could not be interpreted.
    #[error("error parsing header for {catalog_id}: {reason}")]
    Scrape {
        /// Catalog identifier.
        catalog_id: String,
        /// What went wrong.
        reason: String,
    },

    /// The source did not publish a manifest URL for this catalog entry.
    #[error("no manifest URL found for {catalog_id}")]
    MissingManifestUrl {
        /// Catalog identifier.
        catalog_id: String,
    },

    /// The header page could not be typeset or serialized.
    #[error("error writing header PDF: {reason}")]
    Render {
        /// What went wrong.
        reason: String,
    },

    /// The output file could not be created or written.
    #[error("error creating header file {path}: {source}")]
    Io {
        /// Output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The header task ended without signalling completion.
    #[error("header task ended without reporting a result")]
    Dropped,
}

impl HeaderError {
    /// Creates a scrape error.
    pub fn scrape(catalog_id: impl Into<String>, reason: impl Display) -> Self {
        Self::Scrape {
            catalog_id: catalog_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a render error from any displayable cause.
    pub fn render(reason: impl Display) -> Self {
        Self::Render {
            reason: reason.to_string(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Acquires header metadata for a catalog ID.
///
/// Implementations are source specific (they know the catalog's URL scheme
/// and page markup).
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Returns the source's name (e.g., "colenda").
    fn name(&self) -> &str;

    /// Acquires metadata for `catalog_id`.
    async fn acquire(&self, catalog_id: &str) -> Result<HeaderArtifact, HeaderError>;
}

/// Header source that returns an artifact acquired earlier.
///
/// Used when the header must be known before resolution starts (for
/// example when it carries the manifest URL), so the header task only has
/// to render.
#[derive(Debug, Clone)]
pub struct StaticHeaderSource {
    artifact: HeaderArtifact,
}

impl StaticHeaderSource {
    /// Wraps an already acquired artifact.
    #[must_use]
    pub fn new(artifact: HeaderArtifact) -> Self {
        Self { artifact }
    }
}

#[async_trait]
impl HeaderSource for StaticHeaderSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn acquire(&self, _catalog_id: &str) -> Result<HeaderArtifact, HeaderError> {
        Ok(self.artifact.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_returns_artifact() {
        let mut artifact = HeaderArtifact::new("bib1", "Hamlet");
        artifact.manifest_url = Some("https://example.org/manifest".to_string());
        let source = StaticHeaderSource::new(artifact.clone());

        assert_eq!(source.name(), "static");
        assert_eq!(source.acquire("ignored").await.unwrap(), artifact);
    }

    #[test]
    fn test_header_error_messages() {
        let msg = HeaderError::scrape("81431", "no title").to_string();
        assert!(msg.contains("81431") && msg.contains("no title"), "got: {msg}");

        let msg = HeaderError::MissingManifestUrl {
            catalog_id: "bib1".to_string(),
        }
        .to_string();
        assert!(msg.contains("bib1"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let msg = HeaderError::io("/out/x.pdf", io).to_string();
        assert!(msg.contains("/out/x.pdf"));
    }

    #[test]
    fn test_property_new() {
        let property = Property::new("Date:", "1450");
        assert_eq!(property.key, "Date:");
        assert_eq!(property.value, "1450");
    }
}
