#![forbid(unsafe_code)]

//! Rebuilds `src/data/allVideos.ts` from an already processed
//! `public/processedVideos.json` without touching any thumbnails.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use video_catalog_tools::catalog;
use video_catalog_tools::config::ProjectPaths;
use video_catalog_tools::logging::init_tracing;
use video_catalog_tools::metadata::read_processed_json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Wrap processed videos into the catalog module.")]
struct Cli {
    #[arg(
        long = "root",
        value_name = "PATH",
        default_value = ".",
        help = "Project root containing src/data and public"
    )]
    root: PathBuf,
    #[arg(
        long = "source",
        value_name = "PATH",
        help = "Override the processed videos JSON (default public/processedVideos.json)"
    )]
    source: Option<PathBuf>,
    #[arg(
        long = "output",
        value_name = "PATH",
        help = "Override the generated module (default src/data/allVideos.ts)"
    )]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing("info")?;
    let cli = Cli::parse();
    let paths = ProjectPaths::from_root(&cli.root);
    let source = cli.source.unwrap_or(paths.processed_json);
    let output = cli.output.unwrap_or(paths.catalog_module);

    let records = read_processed_json(&source)?;
    let assembled = catalog::assemble(records);
    catalog::write_module(&output, &assembled.videos)?;
    info!(
        path = %output.display(),
        videos = assembled.report.emitted,
        incomplete = assembled.report.incomplete,
        duplicates = assembled.report.duplicates,
        "catalog module written"
    );
    Ok(())
}
