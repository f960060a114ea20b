//! Concurrent header task with a single-shot completion signal.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::{HeaderError, HeaderSource, write_header_file};

/// Handle to a running header task.
///
/// The task acquires the header from its source and renders it to the
/// output path. [`HeaderTask::wait`] consumes the handle, so the
/// completion signal is observed exactly once.
#[derive(Debug)]
pub struct HeaderTask {
    receiver: oneshot::Receiver<Result<(), HeaderError>>,
}

impl HeaderTask {
    /// Waits for the task to finish acquiring and rendering.
    ///
    /// # Errors
    ///
    /// Returns the acquisition or render error, or [`HeaderError::Dropped`]
    /// if the task ended without reporting.
    pub async fn wait(self) -> Result<(), HeaderError> {
        self.receiver.await.unwrap_or(Err(HeaderError::Dropped))
    }
}

/// Spawns a header task writing to `output_path`.
///
/// Acquisition happens first; if it fails, rendering is skipped and the
/// error is signalled. The output file is only created once acquisition
/// has succeeded.
#[must_use = "the header task must be awaited before assembly"]
pub fn run_header_task(
    source: Arc<dyn HeaderSource>,
    catalog_id: impl Into<String>,
    output_path: impl Into<PathBuf>,
) -> HeaderTask {
    let catalog_id = catalog_id.into();
    let output_path = output_path.into();
    let (sender, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let result = produce_header(source.as_ref(), &catalog_id, output_path).await;
        if let Err(e) = &result {
            warn!(catalog_id = %catalog_id, error = %e, "header task failed");
        }
        // Receiver gone means the pipeline already gave up on this run.
        if sender.send(result).is_err() {
            debug!(catalog_id = %catalog_id, "header result dropped; receiver closed");
        }
    });

    HeaderTask { receiver }
}

#[instrument(skip(source), fields(source = source.name(), path = %output_path.display()))]
async fn produce_header(
    source: &dyn HeaderSource,
    catalog_id: &str,
    output_path: PathBuf,
) -> Result<(), HeaderError> {
    let artifact = source.acquire(catalog_id).await?;
    debug!(
        title = %artifact.title,
        properties = artifact.properties.len(),
        links = artifact.links.len(),
        "header acquired"
    );

    tokio::task::spawn_blocking(move || write_header_file(&artifact, &output_path))
        .await
        .map_err(HeaderError::render)??;

    info!("header page written");
    Ok(())
}
