//! HTTP service exposing the pipeline.
//!
//! # Routes
//!
//! - `GET /parse/{manifest_url}` - Build from a percent-encoded manifest URL
//! - `GET /parse/penn/{catalog_id}` - Build from a Colenda catalog ID, with
//!   a header page
//! - `GET /parse/shakespeare/{catalog_id}` - Build from a Folger catalog ID;
//!   the manifest URL comes from the scraped catalog page
//!
//! All accept `?pages=0,2,5-9` and answer with the document as an
//! attachment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use folio_core::{
    BuildReport, ColendaCatalog, FolgerCatalog, ManifestSource, PageSelection, Pipeline,
    PipelineError,
};
use serde::Deserialize;
use tempfile::TempPath;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Listen address used when neither flag nor config sets one.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Pipeline,
    colenda: ColendaCatalog,
    folger: FolgerCatalog,
    output_dir: PathBuf,
}

impl AppState {
    /// Creates handler state; documents are staged in `output_dir`.
    #[must_use]
    pub fn new(
        pipeline: Pipeline,
        colenda: ColendaCatalog,
        folger: FolgerCatalog,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            colenda,
            folger,
            output_dir,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    pages: Option<String>,
}

/// Error returned by handlers as a plain-text body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_input_error() {
            Self::bad_request(e.to_string())
        } else {
            Self::internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Builds the CORS layer for `allowed_origin` (`*` allows any origin).
fn build_cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = if allowed_origin == "*" {
        AllowOrigin::any()
    } else {
        match allowed_origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                warn!(allowed_origin, "invalid CORS origin; allowing any origin");
                AllowOrigin::any()
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .expose_headers(Any)
}

/// Creates the API router.
pub fn router(state: AppState, allowed_origin: &str) -> Router {
    Router::new()
        .route("/parse/penn/{catalog_id}", get(parse_penn))
        .route("/parse/shakespeare/{catalog_id}", get(parse_shakespeare))
        .route("/parse/{manifest_url}", get(parse_manifest))
        .layer(build_cors_layer(allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `address` and serves until Ctrl+C or SIGTERM.
pub async fn serve(address: SocketAddr, state: AppState, allowed_origin: &str) -> Result<()> {
    tokio::fs::create_dir_all(&state.output_dir)
        .await
        .with_context(|| format!("Failed to create '{}'", state.output_dir.display()))?;

    let app = router(state, allowed_origin);
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(%address, "folio listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn parse_manifest(
    State(state): State<AppState>,
    UrlPath(manifest_url): UrlPath<String>,
    Query(query): Query<PagesQuery>,
) -> Result<Response, ApiError> {
    if manifest_url.trim().is_empty() {
        return Err(ApiError::bad_request("Missing manifest URL"));
    }
    let selection = parse_pages(query.pages.as_deref())?;

    let output = stage_output(&state.output_dir, "manifest").await?;
    let report = state
        .pipeline
        .build_document(&ManifestSource::Url(manifest_url), &output, &selection, None)
        .await?;
    send_document(output, &report, "manifest.pdf").await
}

async fn parse_penn(
    State(state): State<AppState>,
    UrlPath(catalog_id): UrlPath<String>,
    Query(query): Query<PagesQuery>,
) -> Result<Response, ApiError> {
    if catalog_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing catalog ID"));
    }
    let selection = parse_pages(query.pages.as_deref())?;

    let output = stage_output(&state.output_dir, &catalog_id).await?;
    let manifest = ManifestSource::Url(state.colenda.manifest_url(&catalog_id));
    let report = state
        .pipeline
        .build_with_header(
            Arc::new(state.colenda.clone()),
            &catalog_id,
            &manifest,
            &output,
            &selection,
        )
        .await?;
    send_document(output, &report, &format!("{catalog_id}.pdf")).await
}

async fn parse_shakespeare(
    State(state): State<AppState>,
    UrlPath(catalog_id): UrlPath<String>,
    Query(query): Query<PagesQuery>,
) -> Result<Response, ApiError> {
    if catalog_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing catalog ID"));
    }
    let selection = parse_pages(query.pages.as_deref())?;

    let output = stage_output(&state.output_dir, &catalog_id).await?;
    let report = state
        .pipeline
        .build_from_header_source(
            Arc::new(state.folger.clone()),
            &catalog_id,
            &output,
            &selection,
        )
        .await?;
    send_document(output, &report, &format!("{catalog_id}.pdf")).await
}

fn parse_pages(pages: Option<&str>) -> Result<PageSelection, ApiError> {
    PageSelection::from_option(pages).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Reserves a uniquely named output path, removed when dropped.
async fn stage_output(output_dir: &Path, stem: &str) -> Result<TempPath, ApiError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Error creating output directory: {e}")))?;
    let prefix = format!("{}-", sanitize_filename(stem));
    let output_dir = output_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".pdf")
            .tempfile_in(output_dir)
            .map(tempfile::NamedTempFile::into_temp_path)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Error creating output file: {e}")))?
    .map_err(|e| ApiError::internal(format!("Error creating output file: {e}")))
}

async fn send_document(
    output: TempPath,
    report: &BuildReport,
    filename: &str,
) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&output)
        .await
        .map_err(|e| ApiError::internal(format!("Error reading output file: {e}")))?;
    drop(output);

    info!(
        requested = report.requested,
        downloaded = report.downloaded,
        pages = report.pages,
        bytes = bytes.len(),
        "sending document"
    );

    let disposition = format!("attachment; filename={}", sanitize_filename(filename));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
