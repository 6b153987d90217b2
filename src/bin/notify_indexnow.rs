#![forbid(unsafe_code)]

//! Submits new video page URLs to IndexNow, remembering what was already
//! sent in `.indexnow_cache.json`.

use anyhow::Result;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use tracing::info;
use video_catalog_tools::config::{ProjectPaths, SiteConfig, load_env_config};
use video_catalog_tools::indexnow::{self, HttpSubmitter, SUBMIT_TIMEOUT};
use video_catalog_tools::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(author, version, about = "Notify IndexNow about new video pages.")]
struct Cli {
    #[arg(
        long = "root",
        value_name = "PATH",
        default_value = ".",
        help = "Project root containing .env and src/data/videos.json"
    )]
    root: PathBuf,
    #[arg(
        long = "dry-run",
        help = "List pending URLs without submitting or updating the cache"
    )]
    dry_run: bool,
}

fn main() -> Result<()> {
    init_tracing("info")?;
    let cli = Cli::parse();

    let env_config = load_env_config(&cli.root, |key| env::var(key).ok())?;
    let site = SiteConfig::from_env(&env_config)?;
    let paths = ProjectPaths::from_root(&cli.root);
    let submitter = HttpSubmitter::new(site.endpoint.clone(), SUBMIT_TIMEOUT);

    let report = indexnow::run(&site, &paths, &submitter, cli.dry_run)?;
    info!(
        current = report.current,
        pending = report.pending,
        chunks = report.chunks,
        accepted = report.accepted_chunks,
        failed = report.failed_chunks,
        "IndexNow notification finished"
    );
    Ok(())
}
