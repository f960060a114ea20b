//! CLI entry point for folio.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use folio_core::{
    BuildReport, ColendaCatalog, DEFAULT_CONCURRENCY, FolgerCatalog, ManifestSource, Pipeline,
    PipelineOptions,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod server;

use app_config::{FileConfig, load_default_file_config};
use cli::{Args, Command};

/// Settings after layering defaults, config file and flags.
#[derive(Debug, Clone)]
struct Settings {
    options: PipelineOptions,
    output_dir: PathBuf,
    bind_addr: String,
    allowed_origin: String,
}

impl Settings {
    /// Flags win over the config file, which wins over built-in defaults.
    fn resolve(args: &Args, file: &FileConfig) -> Self {
        let defaults = PipelineOptions::default();
        let concurrency = args
            .concurrency
            .or(file.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from);

        let bind_addr = match &args.command {
            Command::Serve { bind: Some(bind) } => bind.clone(),
            _ => file
                .bind_addr
                .clone()
                .unwrap_or_else(|| server::DEFAULT_BIND_ADDR.to_string()),
        };

        Self {
            options: PipelineOptions {
                concurrency,
                work_root: args
                    .work_dir
                    .clone()
                    .or_else(|| file.work_dir.clone())
                    .unwrap_or(defaults.work_root),
                connect_timeout_secs: file
                    .connect_timeout_secs
                    .unwrap_or(defaults.connect_timeout_secs),
                read_timeout_secs: file
                    .read_timeout_secs
                    .unwrap_or(defaults.read_timeout_secs),
            },
            output_dir: args
                .output_dir
                .clone()
                .or_else(|| file.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(".")),
            bind_addr,
            allowed_origin: file
                .allowed_origin
                .clone()
                .unwrap_or_else(|| "*".to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_default_file_config()?;
    if let Some(path) = loaded.config.as_ref().and(loaded.path.as_ref()) {
        debug!(path = %path.display(), "loaded config file");
    }
    let settings = Settings::resolve(&args, &loaded.config.unwrap_or_default());
    debug!(?settings, "effective settings");

    let pipeline = Pipeline::new(settings.options.clone())?;

    match args.command {
        Command::Manifest { url, pages, output } => {
            let output = output.unwrap_or_else(|| settings.output_dir.join("manifest.pdf"));
            ensure_parent(&output).await?;
            let report = pipeline
                .build_document(
                    &ManifestSource::Url(url),
                    &output,
                    &pages.unwrap_or_default(),
                    None,
                )
                .await
                .context("Failed to build document")?;
            log_report(&report);
        }
        Command::Penn { catalog_id, pages } => {
            let output = settings.output_dir.join(format!("{catalog_id}.pdf"));
            ensure_parent(&output).await?;
            let catalog = ColendaCatalog::new(pipeline.client().clone());
            let manifest = ManifestSource::Url(catalog.manifest_url(&catalog_id));
            let report = pipeline
                .build_with_header(
                    Arc::new(catalog),
                    &catalog_id,
                    &manifest,
                    &output,
                    &pages.unwrap_or_default(),
                )
                .await
                .with_context(|| format!("Failed to build document for {catalog_id}"))?;
            log_report(&report);
        }
        Command::Shakespeare { catalog_id, pages } => {
            let output = settings.output_dir.join(format!("{catalog_id}.pdf"));
            ensure_parent(&output).await?;
            let catalog = FolgerCatalog::new(pipeline.client().clone());
            let report = pipeline
                .build_from_header_source(
                    Arc::new(catalog),
                    &catalog_id,
                    &output,
                    &pages.unwrap_or_default(),
                )
                .await
                .with_context(|| format!("Failed to build document for {catalog_id}"))?;
            log_report(&report);
        }
        Command::Serve { .. } => {
            let address: SocketAddr = settings
                .bind_addr
                .parse()
                .with_context(|| format!("Invalid bind address '{}'", settings.bind_addr))?;
            let colenda = ColendaCatalog::new(pipeline.client().clone());
            let folger = FolgerCatalog::new(pipeline.client().clone());
            let state =
                server::AppState::new(pipeline, colenda, folger, settings.output_dir.clone());
            server::serve(address, state, &settings.allowed_origin).await?;
        }
    }

    Ok(())
}

async fn ensure_parent(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    Ok(())
}

fn log_report(report: &BuildReport) {
    if report.missing() > 0 {
        warn!(
            missing = report.missing(),
            requested = report.requested,
            "some pages could not be downloaded"
        );
    }
    info!(
        output = %report.output.display(),
        requested = report.requested,
        downloaded = report.downloaded,
        pages = report.pages,
        "document written"
    );
}
