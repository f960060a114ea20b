//! End-to-end manifest-to-PDF orchestration.
//!
//! A run resolves the manifest, downloads the selected images into a
//! scratch directory under the work root, waits for the optional header
//! task, and assembles the surviving images (in page order) after the
//! header page.
//!
//! # Cleanup
//!
//! - The scratch directory is removed when the run ends, successful or not.
//! - On any fatal error the output file is removed, so a failed run never
//!   leaves a partial document behind. A running header task is awaited
//!   first so it cannot recreate the file afterwards.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use folio_core::{ManifestSource, PageSelection, Pipeline, PipelineOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineOptions::default())?;
//! let report = pipeline
//!     .build_document(
//!         &ManifestSource::from("https://example.org/iiif/manifest"),
//!         Path::new("out.pdf"),
//!         &PageSelection::parse("0-9")?,
//!         None,
//!     )
//!     .await?;
//! println!("{} of {} pages", report.downloaded, report.requested);
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::PipelineError;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::assemble::assemble_images;
use crate::download::{
    AssetFetcher, CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DownloadEngine, DownloadSlots,
    HttpClient, READ_TIMEOUT_SECS,
};
use crate::header::{HeaderError, HeaderSource, HeaderTask, StaticHeaderSource, run_header_task};
use crate::manifest::{ManifestSource, resolve_image_urls};
use crate::pages::PageSelection;

/// Default scratch root, relative to the working directory.
pub const DEFAULT_WORK_ROOT: &str = "data";

/// Explicit pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Maximum simultaneous image transfers (1-100).
    pub concurrency: usize,
    /// Directory under which per-run scratch directories are created.
    pub work_root: PathBuf,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            work_root: PathBuf::from(DEFAULT_WORK_ROOT),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Images selected for download.
    pub requested: usize,
    /// Images that downloaded and were assembled.
    pub downloaded: usize,
    /// Total pages in the output, header pages included.
    pub pages: usize,
    /// Output document path.
    pub output: PathBuf,
}

impl BuildReport {
    /// Number of selected images missing from the output.
    #[must_use]
    pub fn missing(&self) -> usize {
        self.requested - self.downloaded
    }
}

/// Manifest-to-PDF pipeline.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct Pipeline {
    client: HttpClient,
    engine: DownloadEngine,
    fetcher: Arc<dyn AssetFetcher>,
    work_root: PathBuf,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("engine", &self.engine)
            .field("work_root", &self.work_root)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline fetching images over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConcurrency`] if the concurrency
    /// ceiling is out of range.
    pub fn new(options: PipelineOptions) -> Result<Self, PipelineError> {
        let engine = DownloadEngine::new(options.concurrency)?;
        let client =
            HttpClient::new_with_timeouts(options.connect_timeout_secs, options.read_timeout_secs);
        Ok(Self {
            fetcher: Arc::new(client.clone()),
            client,
            engine,
            work_root: options.work_root,
        })
    }

    /// Replaces the per-image fetcher (manifest requests still use HTTP).
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// HTTP client used for manifest and catalog requests.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Root under which scratch directories are created.
    #[must_use]
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Resolves the manifest and downloads the selected images into
    /// `work_dir`, which the caller owns.
    ///
    /// Individual download failures leave their slot empty; they are not
    /// returned as errors.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Manifest`] if resolution fails; no image
    /// is requested in that case.
    #[instrument(skip(self, source, selection), fields(source = %source.describe(), pages = %selection))]
    pub async fn resolve_and_download(
        &self,
        source: &ManifestSource,
        selection: &PageSelection,
        work_dir: &Path,
    ) -> Result<DownloadSlots, PipelineError> {
        let urls = resolve_image_urls(&self.client, source, selection).await?;
        Ok(self
            .engine
            .download_all(Arc::clone(&self.fetcher), &urls, work_dir)
            .await)
    }

    /// Builds the output document at `output`.
    ///
    /// When `header` is given, assembly waits for it and appends the image
    /// pages after the header pages it rendered; a header failure fails
    /// the run.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`PipelineError`]; the output file does not
    /// exist afterwards.
    #[instrument(skip(self, source, selection, header), fields(source = %source.describe(), output = %output.display(), pages = %selection, header = header.is_some()))]
    pub async fn build_document(
        &self,
        source: &ManifestSource,
        output: &Path,
        selection: &PageSelection,
        header: Option<HeaderTask>,
    ) -> Result<BuildReport, PipelineError> {
        let mut header = header;
        let result = self.run(source, output, selection, &mut header).await;

        if let Err(e) = &result {
            if let Some(task) = header.take() {
                if let Err(header_err) = task.wait().await {
                    debug!(error = %header_err, "header task also failed");
                }
            }
            remove_output(output).await;
            warn!(error = %e, "build failed");
        }
        result
    }

    /// Builds the output with a header acquired from `source` while the
    /// images download.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::build_document`].
    pub async fn build_with_header(
        &self,
        source: Arc<dyn HeaderSource>,
        catalog_id: &str,
        manifest: &ManifestSource,
        output: &Path,
        selection: &PageSelection,
    ) -> Result<BuildReport, PipelineError> {
        let task = run_header_task(source, catalog_id, output);
        self.build_document(manifest, output, selection, Some(task))
            .await
    }

    /// Acquires the header first and builds from the manifest URL it
    /// carries; the header page is rendered while the images download.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::MissingManifestUrl`] if the header carries no
    /// manifest URL, otherwise see [`Pipeline::build_document`].
    #[instrument(skip(self, source, selection), fields(source = source.name()))]
    pub async fn build_from_header_source(
        &self,
        source: Arc<dyn HeaderSource>,
        catalog_id: &str,
        output: &Path,
        selection: &PageSelection,
    ) -> Result<BuildReport, PipelineError> {
        let artifact = source.acquire(catalog_id).await?;
        let Some(manifest_url) = artifact.manifest_url.clone() else {
            return Err(HeaderError::MissingManifestUrl {
                catalog_id: catalog_id.to_string(),
            }
            .into());
        };
        debug!(manifest_url = %manifest_url, "header supplied manifest URL");

        let task = run_header_task(
            Arc::new(StaticHeaderSource::new(artifact)),
            catalog_id,
            output,
        );
        self.build_document(
            &ManifestSource::Url(manifest_url),
            output,
            selection,
            Some(task),
        )
        .await
    }

    async fn run(
        &self,
        source: &ManifestSource,
        output: &Path,
        selection: &PageSelection,
        header: &mut Option<HeaderTask>,
    ) -> Result<BuildReport, PipelineError> {
        let urls = resolve_image_urls(&self.client, source, selection).await?;
        let scratch = self.scratch_dir(output).await?;

        let slots = self
            .engine
            .download_all(Arc::clone(&self.fetcher), &urls, scratch.path())
            .await;

        let has_header = header.is_some();
        if let Some(task) = header.take() {
            task.wait().await?;
        }

        let requested = slots.requested();
        let downloaded = slots.downloaded();
        info!(requested, downloaded, "images downloaded");
        if downloaded == 0 {
            return Err(PipelineError::NoAssets { requested });
        }

        let pages = assemble_images(slots.into_paths(), output.to_path_buf(), has_header).await?;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove work directory");
        }

        Ok(BuildReport {
            requested,
            downloaded,
            pages,
            output: output.to_path_buf(),
        })
    }

    /// Creates a fresh scratch directory named after the output file.
    async fn scratch_dir(&self, output: &Path) -> Result<TempDir, PipelineError> {
        let work_root = self.work_root.clone();
        let prefix = format!(
            "{}-",
            output
                .file_stem()
                .map_or_else(|| "run".into(), |s| s.to_string_lossy())
        );

        let dir = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&work_root)
                .and_then(|()| tempfile::Builder::new().prefix(&prefix).tempdir_in(&work_root))
                .map_err(|e| PipelineError::io(&work_root, e))
        })
        .await
        .map_err(|e| PipelineError::io(&self.work_root, std::io::Error::other(e)))??;

        debug!(path = %dir.path().display(), "created work directory");
        Ok(dir)
    }
}

async fn remove_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(path = %output.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %output.display(), error = %e, "failed to remove partial output"),
    }
}
