//! Error types for manifest resolution.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that abort manifest resolution before any image is downloaded.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be fetched (transport error or non-2xx status).
    #[error("error getting manifest {url}: {source}")]
    Fetch {
        /// Manifest URL.
        url: String,
        /// The underlying request error.
        #[source]
        source: DownloadError,
    },

    /// The manifest body is not valid manifest JSON.
    #[error("error parsing manifest JSON: {source}")]
    Decode {
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The manifest does not contain exactly one sequence.
    #[error("there should be exactly one sequence in the manifest, found {sequences}")]
    Structure {
        /// Number of sequences found.
        sequences: usize,
    },

    /// An included canvas carries no image.
    #[error("there are no images in the canvas of index {index}")]
    EmptyCanvas {
        /// Zero-based canvas index.
        index: usize,
    },
}

impl ManifestError {
    /// Creates a fetch error.
    pub fn fetch(url: impl Into<String>, source: DownloadError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_error_reports_count() {
        let msg = ManifestError::Structure { sequences: 2 }.to_string();
        assert!(msg.contains("exactly one sequence"));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_empty_canvas_error_reports_index() {
        let msg = ManifestError::EmptyCanvas { index: 7 }.to_string();
        assert!(msg.contains("index 7"), "got: {msg}");
    }

    #[test]
    fn test_fetch_error_chains_source() {
        let err = ManifestError::fetch(
            "https://example.org/manifest",
            DownloadError::http_status("https://example.org/manifest", 503),
        );
        let msg = err.to_string();
        assert!(msg.contains("https://example.org/manifest"));
        assert!(msg.contains("503"));
    }
}
