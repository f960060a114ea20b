//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use folio_core::PageSelection;

/// Bind paginated IIIF manifests into a single PDF.
///
/// Folio resolves a manifest, downloads the selected page images with
/// bounded concurrency and assembles them, optionally behind a metadata
/// page scraped from the source catalog.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Maximum concurrent image downloads (1-100) [default: 10]
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Root directory for per-run scratch directories [default: data]
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Directory generated documents are written to [default: .]
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a PDF from a manifest URL
    Manifest {
        /// IIIF manifest URL
        url: String,

        /// Zero-based pages to include, e.g. "0,2,5-9" [default: all]
        #[arg(short, long)]
        pages: Option<PageSelection>,

        /// Output file [default: <output-dir>/manifest.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a PDF with a catalog header page from a Penn Libraries (Colenda) ID
    Penn {
        /// Colenda catalog ID, e.g. 81431-p3hk28
        catalog_id: String,

        /// Zero-based pages to include, e.g. "0,2,5-9" [default: all]
        #[arg(short, long)]
        pages: Option<PageSelection>,
    },

    /// Build a PDF with a catalog header page from a Folger Shakespeare Library ID
    Shakespeare {
        /// Folger digital collections ID, e.g. bib244741-309974-lb41
        catalog_id: String,

        /// Zero-based pages to include, e.g. "0,2,5-9" [default: all]
        #[arg(short, long)]
        pages: Option<PageSelection>,
    },

    /// Serve documents over HTTP
    Serve {
        /// Listen address [default: 127.0.0.1:8080]
        #[arg(short, long)]
        bind: Option<String>,
    },
}
