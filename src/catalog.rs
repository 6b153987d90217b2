//! Final assembly of the video catalog: completeness filter, id dedup,
//! newest-first ordering, and the generated TypeScript module.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::warn;

use crate::metadata::ProcessedVideoRecord;

/// Counters describing what happened to the processed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogReport {
    pub input: usize,
    pub incomplete: usize,
    pub duplicates: usize,
    pub emitted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub videos: Vec<ProcessedVideoRecord>,
    pub report: CatalogReport,
}

/// Names of required fields that are empty (or a non-positive duration).
pub fn missing_fields(record: &ProcessedVideoRecord) -> Vec<&'static str> {
    let text_fields = [
        ("id", &record.id),
        ("title", &record.title),
        ("description", &record.description),
        ("category", &record.category),
        ("embedUrl", &record.embed_url),
        ("thumbnail", &record.thumbnail),
    ];
    let mut missing: Vec<&'static str> = text_fields
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
    if !record.duration_seconds().is_some_and(|seconds| seconds > 0.0) {
        missing.push("duration");
    }
    missing
}

pub fn is_complete(record: &ProcessedVideoRecord) -> bool {
    missing_fields(record).is_empty()
}

/// Milliseconds since the epoch for a `datePublished` value. Numbers are
/// already milliseconds. Missing or unparsable dates count as the epoch
/// itself, i.e. the oldest entry.
pub fn publish_timestamp(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::String(raw)) => parse_date_millis(raw),
        Some(Value::Number(millis)) => millis
            .as_i64()
            .or_else(|| millis.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn parse_date_millis(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return datetime.timestamp_millis();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.and_utc().timestamp_millis();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc().timestamp_millis();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp_millis())
            .unwrap_or(0);
    }
    0
}

/// Filters, deduplicates (first occurrence wins) and sorts newest first.
/// Ties keep their input order.
pub fn assemble(records: Vec<ProcessedVideoRecord>) -> Catalog {
    let mut report = CatalogReport {
        input: records.len(),
        ..CatalogReport::default()
    };

    let mut seen = HashSet::new();
    let mut videos = Vec::with_capacity(records.len());
    for record in records {
        let missing = missing_fields(&record);
        if !missing.is_empty() {
            warn!(
                id = %record.id,
                title = %record.title,
                missing = ?missing,
                "excluding incomplete video"
            );
            report.incomplete += 1;
            continue;
        }
        if !seen.insert(record.id.clone()) {
            warn!(id = %record.id, title = %record.title, "duplicate video ignored");
            report.duplicates += 1;
            continue;
        }
        videos.push(record);
    }

    videos.sort_by_key(|video| Reverse(publish_timestamp(video.date_published.as_ref())));
    report.emitted = videos.len();
    Catalog { videos, report }
}

/// TypeScript module default-exporting the catalog as a typed literal.
pub fn render_module(videos: &[ProcessedVideoRecord]) -> Result<String> {
    let json = serde_json::to_string_pretty(videos).context("serializing catalog")?;
    Ok(format!(
        "import type {{ VideoData }} from '../utils/data';\n\n\
         const allVideos: VideoData[] = {json};\n\n\
         export default allVideos;\n"
    ))
}

/// Overwrites `path` with the rendered module.
pub fn write_module(path: &Path, videos: &[ProcessedVideoRecord]) -> Result<()> {
    let contents = render_module(videos)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
