//! Error types for document assembly.

use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort assembly of the output document.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The PDF structure could not be loaded, built or written.
    #[error("error building PDF: {reason}")]
    Pdf {
        /// What went wrong.
        reason: String,
    },

    /// A downloaded file is not a decodable image.
    #[error("error reading image {path}: {source}")]
    Image {
        /// Image path.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: image::ImageError,
    },

    /// A file could not be read or written.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking assembly task panicked or was cancelled.
    #[error("assembly task failed: {reason}")]
    Join {
        /// Join failure description.
        reason: String,
    },
}

impl AssemblyError {
    /// Creates a PDF error from any displayable cause.
    pub fn pdf(reason: impl Display) -> Self {
        Self::Pdf {
            reason: reason.to_string(),
        }
    }

    /// Creates an image decode error.
    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a join error.
    pub fn join(reason: impl Display) -> Self {
        Self::Join {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_error_display() {
        let msg = AssemblyError::pdf("missing Root").to_string();
        assert_eq!(msg, "error building PDF: missing Root");
    }

    #[test]
    fn test_io_error_includes_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let msg = AssemblyError::io("/scratch/img_2.jpg", io).to_string();
        assert!(msg.contains("/scratch/img_2.jpg"));
    }
}
