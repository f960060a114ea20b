//! IIIF manifest model and image URL resolution.
//!
//! A manifest holds exactly one sequence of canvases; each canvas is one
//! page and references one or more images. Resolution picks the first
//! image of every selected canvas and rewrites its thumbnail size segment
//! into a full-resolution one.
//!
//! # Example
//!
//! ```
//! use folio_core::manifest::{ManifestSource, resolve_image_urls_from_bytes};
//! use folio_core::pages::PageSelection;
//!
//! let json = br#"{"sequences":[{"canvases":[
//!     {"images":[{"resource":{"@id":"https://example.org/iiif/a/full/!200,200/0/default.jpg"}}]}
//! ]}]}"#;
//! let urls = resolve_image_urls_from_bytes(json, &PageSelection::all()).unwrap();
//! assert_eq!(urls, vec!["https://example.org/iiif/a/full/2000,/0/default.jpg"]);
//! ```

mod error;

pub use error::ManifestError;

use serde::Deserialize;
use tracing::{debug, info, instrument, trace};

use crate::download::HttpClient;
use crate::pages::PageSelection;

/// Thumbnail size segment found in catalog-provided image identifiers.
pub const LOW_RES_MARKER: &str = "/full/!200,200/0/default.jpg";

/// Full-resolution size segment substituted for [`LOW_RES_MARKER`].
pub const HIGH_RES_MARKER: &str = "/full/2000,/0/default.jpg";

/// Decoded manifest document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    /// Top-level sequences; a valid manifest has exactly one.
    #[serde(default)]
    pub sequences: Vec<Sequence>,
}

/// Ordered list of canvases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sequence {
    /// Pages in reading order.
    #[serde(default)]
    pub canvases: Vec<Canvas>,
}

/// One logical page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Canvas {
    /// Images painted on this page; only the first is used.
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Image annotation on a canvas.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Image {
    /// Image resource.
    #[serde(default)]
    pub resource: Resource,
}

/// Image resource reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resource {
    /// IIIF image request URL.
    #[serde(rename = "@id", default)]
    pub id: String,
}

impl Manifest {
    /// Decodes a manifest from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Decode`] on malformed JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(bytes).map_err(|source| ManifestError::Decode { source })
    }

    /// Returns the single sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Structure`] unless there is exactly one.
    pub fn sequence(&self) -> Result<&Sequence, ManifestError> {
        match self.sequences.as_slice() {
            [sequence] => Ok(sequence),
            other => Err(ManifestError::Structure {
                sequences: other.len(),
            }),
        }
    }

    /// Extracts one full-resolution image URL per selected canvas, in
    /// canvas order.
    ///
    /// Excluded canvases are skipped entirely. An included canvas without
    /// images fails the whole manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Structure`] or [`ManifestError::EmptyCanvas`].
    pub fn image_urls(&self, selection: &PageSelection) -> Result<Vec<String>, ManifestError> {
        let sequence = self.sequence()?;
        let mut urls = Vec::new();

        for (index, canvas) in sequence.canvases.iter().enumerate() {
            if !selection.includes(index) {
                continue;
            }
            let Some(first) = canvas.images.first() else {
                return Err(ManifestError::EmptyCanvas { index });
            };
            trace!(index, resource_id = %first.resource.id, "selected canvas");
            urls.push(upscale_image_id(&first.resource.id));
        }

        debug!(
            canvases = sequence.canvases.len(),
            selected = urls.len(),
            "extracted image URLs"
        );
        Ok(urls)
    }
}

/// Where to read the manifest from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// Fetch the manifest over HTTP.
    Url(String),
    /// Manifest JSON that was already fetched.
    Bytes(Vec<u8>),
}

impl ManifestSource {
    /// Short description used for logging and scratch directory naming.
    #[must_use]
    pub fn describe(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Bytes(_) => "<inline manifest>",
        }
    }
}

impl From<&str> for ManifestSource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for ManifestSource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

/// Rewrites the thumbnail size segment of an image identifier into the
/// full-resolution one.
///
/// Only the first occurrence is replaced. Identifiers without the marker
/// are returned unchanged.
#[must_use]
pub fn upscale_image_id(id: &str) -> String {
    id.replacen(LOW_RES_MARKER, HIGH_RES_MARKER, 1)
}

/// Decodes manifest bytes and resolves the selected image URLs.
///
/// # Errors
///
/// Returns [`ManifestError::Decode`], [`ManifestError::Structure`] or
/// [`ManifestError::EmptyCanvas`].
pub fn resolve_image_urls_from_bytes(
    bytes: &[u8],
    selection: &PageSelection,
) -> Result<Vec<String>, ManifestError> {
    Manifest::from_slice(bytes)?.image_urls(selection)
}

/// Fetches (if needed) and resolves a manifest into selected image URLs.
///
/// # Errors
///
/// Returns [`ManifestError::Fetch`] on transport failure or non-2xx
/// status, and the decode/structure errors of
/// [`resolve_image_urls_from_bytes`].
#[instrument(skip(client, source, selection), fields(source = %source.describe(), pages = %selection))]
pub async fn resolve_image_urls(
    client: &HttpClient,
    source: &ManifestSource,
    selection: &PageSelection,
) -> Result<Vec<String>, ManifestError> {
    let urls = match source {
        ManifestSource::Url(url) => {
            let body = client
                .fetch_bytes(url)
                .await
                .map_err(|e| ManifestError::fetch(url.as_str(), e))?;
            resolve_image_urls_from_bytes(&body, selection)?
        }
        ManifestSource::Bytes(body) => resolve_image_urls_from_bytes(body, selection)?,
    };
    info!(images = urls.len(), "extracted images");
    Ok(urls)
}
