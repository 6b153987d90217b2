//! The thumbnail pipeline run: load source records, materialize every
//! thumbnail, assemble the catalog and write the generated module.

use anyhow::{Context, Result};
use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::info;

use crate::catalog::{self, CatalogReport};
use crate::config::ProjectPaths;
use crate::metadata::{self, ProcessedVideoRecord, VideoRecord};
use crate::thumbnails::{ArtifactStore, ImageSource, Materialization, Materializer, ThumbnailSettings};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Worker threads for thumbnail work; 1 processes records in order on
    /// the calling thread.
    pub jobs: usize,
    /// Also write `public/processedVideos.json`.
    pub emit_json: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            emit_json: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub reused: usize,
    pub created: usize,
    pub fallback: usize,
    pub catalog: CatalogReport,
}

impl PipelineReport {
    fn count(&mut self, outcome: &Materialization) {
        match outcome {
            Materialization::Reused(_) => self.reused += 1,
            Materialization::Created(_) => self.created += 1,
            Materialization::Fallback(_) => self.fallback += 1,
        }
    }
}

/// Thumbnail settings for the standard project layout.
pub fn default_settings(paths: &ProjectPaths, target_width: u32, quality: u8) -> ThumbnailSettings {
    ThumbnailSettings {
        output_dir: paths.picture_dir.clone(),
        public_dir: paths.public_dir.clone(),
        url_prefix: paths.picture_url_prefix(),
        target_width,
        quality,
    }
}

/// One outcome per record, in input order regardless of `jobs`.
pub fn materialize_records<S, I>(
    materializer: &Materializer<'_, S, I>,
    videos: &[VideoRecord],
    jobs: usize,
) -> Result<Vec<Materialization>>
where
    S: ArtifactStore,
    I: ImageSource,
{
    if jobs <= 1 {
        return Ok(videos
            .iter()
            .map(|video| materializer.materialize(video))
            .collect());
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|idx| format!("thumbnail-worker-{idx}"))
        .build()
        .context("failed to build rayon pool for thumbnails")?;
    Ok(pool.install(|| {
        videos
            .par_iter()
            .map(|video| materializer.materialize(video))
            .collect()
    }))
}

pub fn run<S, I>(
    paths: &ProjectPaths,
    settings: ThumbnailSettings,
    store: &S,
    source: &I,
    options: PipelineOptions,
) -> Result<PipelineReport>
where
    S: ArtifactStore,
    I: ImageSource,
{
    let videos = metadata::load_video_records(&paths.source_json)?;
    info!(
        count = videos.len(),
        source = %paths.source_json.display(),
        "loaded source videos"
    );
    paths.prepare()?;

    let materializer = Materializer::new(settings, store, source);
    let outcomes = materialize_records(&materializer, &videos, options.jobs)?;

    let mut report = PipelineReport::default();
    let processed: Vec<ProcessedVideoRecord> = videos
        .iter()
        .zip(&outcomes)
        .map(|(video, outcome)| {
            report.count(outcome);
            outcome.apply(video)
        })
        .collect();

    if options.emit_json {
        metadata::write_processed_json(&paths.processed_json, &processed)?;
        info!(path = %paths.processed_json.display(), "processed videos written");
    }

    let assembled = catalog::assemble(processed);
    report.catalog = assembled.report;
    catalog::write_module(&paths.catalog_module, &assembled.videos)?;
    info!(
        path = %paths.catalog_module.display(),
        videos = assembled.videos.len(),
        reused = report.reused,
        created = report.created,
        fallback = report.fallback,
        "catalog module written"
    );
    Ok(report)
}
