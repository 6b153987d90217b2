//! Video records as read from `videos.json` and as emitted into the catalog.
//!
//! The source file is hand-maintained, so fields are read leniently: a value
//! of the wrong JSON type is treated as missing and the catalog filter drops
//! the record later, instead of one bad entry failing the whole build. Keys
//! this crate does not know about (e.g. `dateModified`) are carried through
//! untouched.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::thumbnails::{FALLBACK_HEIGHT, FALLBACK_WIDTH};

/// One entry of the source `videos.json` array.
///
/// Fields the catalog filter checks are coerced to strings or numbers;
/// `datePublished`, `tags` and `previewUrl` keep whatever JSON they hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    /// Absolute URL or path relative to the public asset directory.
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub thumbnail: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_published: Option<Value>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub embed_url: String,
    /// Seconds. Kept as a JSON number so integers stay integers on output.
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Number>,
    #[serde(
        default,
        deserialize_with = "lenient::raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub preview_url: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record after thumbnail materialization; the shape of `VideoData` in the
/// generated catalog module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedVideoRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    /// Site-relative path of the optimized thumbnail or the placeholder.
    #[serde(default, deserialize_with = "lenient::string")]
    pub thumbnail: String,
    #[serde(default = "fallback_width")]
    pub thumbnail_width: u32,
    #[serde(default = "fallback_height")]
    pub thumbnail_height: u32,
    #[serde(
        default,
        deserialize_with = "lenient::raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_published: Option<Value>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub embed_url: String,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Number>,
    #[serde(
        default,
        deserialize_with = "lenient::raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub tags: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::raw",
        skip_serializing_if = "Option::is_none"
    )]
    pub preview_url: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessedVideoRecord {
    /// Copies `video` and attaches the materialized thumbnail.
    pub fn from_source(video: &VideoRecord, thumbnail: String, width: u32, height: u32) -> Self {
        let mut extra = video.extra.clone();
        extra.remove("thumbnailWidth");
        extra.remove("thumbnailHeight");
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            description: video.description.clone(),
            category: video.category.clone(),
            thumbnail,
            thumbnail_width: width,
            thumbnail_height: height,
            date_published: video.date_published.clone(),
            embed_url: video.embed_url.clone(),
            duration: video.duration.clone(),
            tags: video.tags.clone(),
            preview_url: video.preview_url.clone(),
            extra,
        }
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration.as_ref().and_then(Number::as_f64)
    }
}

/// Loads the source array. A missing file or a non-array document is fatal;
/// individual entries that are not objects are skipped with a warning.
pub fn load_video_records(path: &Path) -> Result<Vec<VideoRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading source videos {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing source videos {}", path.display()))?;
    let Value::Array(entries) = document else {
        bail!("{} must contain a JSON array of videos", path.display());
    };

    let mut videos = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            warn!(index, "skipping non-object entry in source videos");
            continue;
        }
        let video: VideoRecord = serde_json::from_value(entry)
            .with_context(|| format!("decoding video #{index} in {}", path.display()))?;
        videos.push(video);
    }
    Ok(videos)
}

/// Writes the flat intermediate file consumed by `prepare_data`.
pub fn write_processed_json(path: &Path, videos: &[ProcessedVideoRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(videos).context("serializing processed videos")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

pub fn read_processed_json(path: &Path) -> Result<Vec<ProcessedVideoRecord>> {
    if !path.exists() {
        bail!(
            "processed videos not found at {}; run process_thumbnails --emit-json first",
            path.display()
        );
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn fallback_width() -> u32 {
    FALLBACK_WIDTH
}

fn fallback_height() -> u32 {
    FALLBACK_HEIGHT
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::{Number, Value};

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(opt_string(deserializer)?.unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Keeps the value as-is, including an explicit `null`.
    pub fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
        Value::deserialize(deserializer).map(Some)
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Number>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn video_record_reads_known_and_extra_fields() {
        let video: VideoRecord = serde_json::from_value(serde_json::json!({
            "id": "v1",
            "title": "First",
            "description": "desc",
            "category": "music",
            "thumbnail": "https://cdn.example/v1.jpg",
            "datePublished": "2024-01-01",
            "dateModified": "2024-02-01",
            "embedUrl": "https://player.example/v1",
            "duration": 120,
            "tags": "a,b"
        }))
        .unwrap();
        assert_eq!(video.id, "v1");
        assert_eq!(video.embed_url, "https://player.example/v1");
        assert_eq!(video.duration.as_ref().and_then(Number::as_u64), Some(120));
        assert_eq!(video.extra.get("dateModified"), Some(&Value::from("2024-02-01")));
    }

    #[test]
    fn wrong_types_are_treated_as_missing() {
        let video: VideoRecord = serde_json::from_value(serde_json::json!({
            "id": 7,
            "title": null,
            "duration": "90",
            "thumbnail": false
        }))
        .unwrap();
        assert_eq!(video.id, "");
        assert_eq!(video.title, "");
        assert!(video.duration.is_none());
        assert!(video.thumbnail.is_none());
    }

    #[test]
    fn pass_through_fields_keep_their_json_type() {
        let source = serde_json::json!({
            "id": "1",
            "tags": ["a", "b"],
            "datePublished": 1700000000000u64,
            "previewUrl": {"x": 1},
            "dateModified": null
        });
        let video: VideoRecord = serde_json::from_value(source).unwrap();
        let processed = ProcessedVideoRecord::from_source(&video, "/placeholder.webp".into(), 300, 168);
        let json = serde_json::to_value(&processed).unwrap();
        assert_eq!(json["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(json["datePublished"], serde_json::json!(1700000000000u64));
        assert_eq!(json["previewUrl"], serde_json::json!({"x": 1}));
        assert_eq!(json.get("dateModified"), Some(&Value::Null));
    }

    #[test]
    fn processed_record_serializes_camel_case_with_integer_duration() {
        let video = VideoRecord {
            id: "v1".into(),
            title: "First".into(),
            duration: Some(Number::from(95)),
            thumbnail: Some("https://cdn.example/a.jpg".into()),
            ..VideoRecord::default()
        };
        let processed =
            ProcessedVideoRecord::from_source(&video, "/picture/first-v1.webp".into(), 300, 168);
        let json = serde_json::to_value(&processed).unwrap();
        assert_eq!(json["thumbnail"], "/picture/first-v1.webp");
        assert_eq!(json["thumbnailWidth"], 300);
        assert_eq!(json["thumbnailHeight"], 168);
        assert_eq!(serde_json::to_string(&json["duration"]).unwrap(), "95");
        assert!(json.get("datePublished").is_none());
    }

    #[test]
    fn load_video_records_rejects_non_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("videos.json");
        fs::write(&path, r#"{"id":"v1"}"#).unwrap();
        let err = load_video_records(&path).unwrap_err();
        assert!(err.to_string().contains("JSON array"));
    }

    #[test]
    fn load_video_records_skips_non_objects() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("videos.json");
        fs::write(&path, r#"[{"id":"v1","title":"A"}, null, 3, {"id":"v2"}]"#).unwrap();
        let videos = load_video_records(&path).unwrap();
        let ids: Vec<_> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, ["v1", "v2"]);
    }

    #[test]
    fn load_video_records_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_video_records(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn processed_json_roundtrip_preserves_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("public").join("processedVideos.json");
        let video = VideoRecord {
            id: "v9".into(),
            title: "Ninth".into(),
            ..VideoRecord::default()
        };
        let records = vec![ProcessedVideoRecord::from_source(
            &video,
            "/placeholder.webp".into(),
            300,
            168,
        )];
        write_processed_json(&path, &records).unwrap();
        assert_eq!(read_processed_json(&path).unwrap(), records);
    }

    #[test]
    fn read_processed_json_defaults_missing_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("processedVideos.json");
        fs::write(
            &path,
            r#"[{"id":"v1","title":"A","thumbnail":"/picture/a-v1.webp","thumbnailHeight":90}]"#,
        )
        .unwrap();
        let records = read_processed_json(&path).unwrap();
        assert_eq!(records[0].thumbnail_width, FALLBACK_WIDTH);
        assert_eq!(records[0].thumbnail_height, 90);
        assert_eq!(records[0].thumbnail, "/picture/a-v1.webp");
    }

    #[test]
    fn read_processed_json_reports_missing_source() {
        let dir = tempdir().unwrap();
        let err = read_processed_json(&dir.path().join("processedVideos.json")).unwrap_err();
        assert!(err.to_string().contains("process_thumbnails"));
    }
}
