#![forbid(unsafe_code)]

//! Optimizes every video thumbnail into `public/picture` and regenerates the
//! typed catalog module `src/data/allVideos.ts`.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use video_catalog_tools::config::ProjectPaths;
use video_catalog_tools::logging::init_tracing;
use video_catalog_tools::pipeline::{self, PipelineOptions};
use video_catalog_tools::thumbnails::{
    DEFAULT_TARGET_WIDTH, DEFAULT_WEBP_QUALITY, FETCH_TIMEOUT, FsArtifactStore, HttpImageSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Optimize video thumbnails and rebuild the catalog.")]
struct Cli {
    #[arg(
        long = "root",
        value_name = "PATH",
        default_value = ".",
        help = "Project root containing src/data and public"
    )]
    root: PathBuf,
    #[arg(
        long = "width",
        value_name = "PX",
        default_value_t = DEFAULT_TARGET_WIDTH,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Maximum thumbnail width; smaller images are not enlarged"
    )]
    width: u32,
    #[arg(
        long = "quality",
        value_name = "1-100",
        default_value_t = DEFAULT_WEBP_QUALITY,
        value_parser = clap::value_parser!(u8).range(1..=100),
        help = "WebP quality"
    )]
    quality: u8,
    #[arg(
        short = 'j',
        long = "jobs",
        value_name = "N",
        default_value_t = 1,
        help = "Thumbnails processed concurrently"
    )]
    jobs: usize,
    #[arg(
        long = "emit-json",
        help = "Also write public/processedVideos.json for prepare_data"
    )]
    emit_json: bool,
}

fn main() -> Result<()> {
    init_tracing("info")?;
    let cli = Cli::parse();

    let paths = ProjectPaths::from_root(&cli.root);
    let settings = pipeline::default_settings(&paths, cli.width, cli.quality);
    let source = HttpImageSource::new(FETCH_TIMEOUT);
    let options = PipelineOptions {
        jobs: cli.jobs,
        emit_json: cli.emit_json,
    };

    let report = pipeline::run(&paths, settings, &FsArtifactStore, &source, options)?;
    if report.fallback > 0 {
        warn!(count = report.fallback, "videos published with the placeholder thumbnail");
    }
    info!(
        emitted = report.catalog.emitted,
        incomplete = report.catalog.incomplete,
        duplicates = report.catalog.duplicates,
        "thumbnail processing complete"
    );
    Ok(())
}
