//! Error type for pipeline runs.

use std::path::PathBuf;

use thiserror::Error;

use crate::assemble::AssemblyError;
use crate::download::EngineError;
use crate::header::HeaderError;
use crate::manifest::ManifestError;
use crate::pages::RangeSpecError;

/// Fatal pipeline failures.
///
/// Per-asset download failures are not represented here: they are logged
/// and reflected in [`BuildReport`](super::BuildReport) counts instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The page selection could not be parsed.
    #[error(transparent)]
    RangeSpec(#[from] RangeSpecError),

    /// The manifest could not be fetched, decoded or validated.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The header could not be acquired or rendered.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// Every selected image failed to download.
    #[error("no images were downloaded ({requested} requested)")]
    NoAssets {
        /// Number of images that were requested.
        requested: usize,
    },

    /// The output document could not be assembled.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// The scratch directory could not be created.
    #[error("error creating work directory {path}: {source}")]
    Io {
        /// Directory path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The concurrency ceiling is out of range.
    #[error(transparent)]
    InvalidConcurrency(#[from] EngineError),
}

impl PipelineError {
    /// Creates a scratch directory IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error was caused by caller input rather than a
    /// remote or local failure.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::RangeSpec(_) | Self::InvalidConcurrency(_))
    }
}
