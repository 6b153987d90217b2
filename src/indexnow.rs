//! IndexNow submission of canonical video page URLs.
//!
//! The notifier keeps a cache of every URL it computed on the previous run
//! and only submits URLs missing from it. The cache is rewritten with the
//! full current set after submitting, whether or not every chunk succeeded.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{ProjectPaths, SiteConfig};
use crate::metadata::{self, VideoRecord};
use crate::slug;

/// IndexNow accepts at most this many URLs per request.
pub const INDEXNOW_CHUNK_SIZE: usize = 10_000;
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload<'a> {
    pub host: &'a str,
    pub key: &'a str,
    pub key_location: &'a str,
    pub url_list: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Accepted { status: u16 },
    Rejected { status: u16, body: String },
    Failed(String),
}

pub trait Submitter {
    fn submit(&self, payload: &SubmissionPayload<'_>) -> ChunkOutcome;
}

/// Posts payloads to the configured IndexNow endpoint.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl Submitter for HttpSubmitter {
    fn submit(&self, payload: &SubmissionPayload<'_>) -> ChunkOutcome {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(err) => return ChunkOutcome::Failed(format!("serializing payload: {err}")),
        };
        match self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json; charset=utf-8")
            .send_string(&body)
        {
            Ok(response) => ChunkOutcome::Accepted {
                status: response.status(),
            },
            Err(ureq::Error::Status(status, response)) => ChunkOutcome::Rejected {
                status,
                body: response.into_string().unwrap_or_default(),
            },
            Err(ureq::Error::Transport(transport)) => ChunkOutcome::Failed(transport.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub current: usize,
    pub pending: usize,
    pub chunks: usize,
    pub accepted_chunks: usize,
    pub failed_chunks: usize,
}

/// `{site}/{slug}-{id}/` for every record that has an id.
pub fn video_urls(site: &SiteConfig, videos: &[VideoRecord]) -> Vec<String> {
    videos
        .iter()
        .filter(|video| {
            if video.id.is_empty() {
                debug!(title = %video.title, "skipping video without id");
            }
            !video.id.is_empty()
        })
        .map(|video| {
            format!(
                "{}/{}/",
                site.site_url,
                slug::video_page_slug(&video.title, &video.id)
            )
        })
        .collect()
}

/// Previously submitted URLs; a missing or unreadable cache means none.
pub fn load_cache(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            info!(path = %path.display(), "no IndexNow cache found, submitting every URL");
            return Vec::new();
        }
    };
    match serde_json::from_str(&content) {
        Ok(urls) => urls,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "IndexNow cache is corrupt, ignoring it");
            Vec::new()
        }
    }
}

pub fn save_cache(path: &Path, urls: &[String]) -> Result<()> {
    let json = serde_json::to_string(urls).context("serializing IndexNow cache")?;
    fs::write(path, json).with_context(|| format!("writing IndexNow cache {}", path.display()))
}

/// URLs in `current` that were not part of the cached set, in order.
pub fn pending_urls(current: &[String], cached: &[String]) -> Vec<String> {
    let cached: HashSet<&str> = cached.iter().map(String::as_str).collect();
    current
        .iter()
        .filter(|url| !cached.contains(url.as_str()))
        .cloned()
        .collect()
}

/// Sends `urls` in chunks of [`INDEXNOW_CHUNK_SIZE`]. A failed chunk is
/// logged and the remaining chunks are still attempted.
pub fn submit_urls<S: Submitter>(
    submitter: &S,
    site: &SiteConfig,
    urls: &[String],
) -> (usize, usize) {
    let mut accepted = 0;
    let mut failed = 0;
    for (index, chunk) in urls.chunks(INDEXNOW_CHUNK_SIZE).enumerate() {
        let payload = SubmissionPayload {
            host: &site.host,
            key: &site.key,
            key_location: &site.key_location,
            url_list: chunk,
        };
        info!(chunk = index + 1, urls = chunk.len(), "submitting URLs to IndexNow");
        match submitter.submit(&payload) {
            ChunkOutcome::Accepted { status } => {
                info!(chunk = index + 1, status, "IndexNow accepted chunk");
                accepted += 1;
            }
            ChunkOutcome::Rejected { status, body } => {
                error!(chunk = index + 1, status, body = %body, "IndexNow rejected chunk");
                failed += 1;
            }
            ChunkOutcome::Failed(reason) => {
                error!(chunk = index + 1, error = %reason, "IndexNow request failed");
                failed += 1;
            }
        }
    }
    (accepted, failed)
}

/// Full notifier run: compute URLs, diff against the cache, submit, and
/// rewrite the cache. With `dry_run` nothing is sent and the cache is kept.
pub fn run<S: Submitter>(
    site: &SiteConfig,
    paths: &ProjectPaths,
    submitter: &S,
    dry_run: bool,
) -> Result<NotifyReport> {
    let videos = metadata::load_video_records(&paths.source_json)?;
    let current = video_urls(site, &videos);
    let cached = load_cache(&paths.indexnow_cache);
    let pending = pending_urls(&current, &cached);

    let mut report = NotifyReport {
        current: current.len(),
        pending: pending.len(),
        chunks: pending.len().div_ceil(INDEXNOW_CHUNK_SIZE),
        ..NotifyReport::default()
    };

    if dry_run {
        for url in &pending {
            info!(url = %url, "would submit");
        }
        return Ok(report);
    }

    if pending.is_empty() {
        info!("no new or updated URLs to submit to IndexNow");
    } else {
        let (accepted, failed) = submit_urls(submitter, site, &pending);
        report.accepted_chunks = accepted;
        report.failed_chunks = failed;
    }
    save_cache(&paths.indexnow_cache, &current)?;
    info!(path = %paths.indexnow_cache.display(), urls = current.len(), "IndexNow cache updated");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingSubmitter {
        sizes: RefCell<Vec<usize>>,
        fail_chunks: Vec<usize>,
    }

    impl Submitter for RecordingSubmitter {
        fn submit(&self, payload: &SubmissionPayload<'_>) -> ChunkOutcome {
            let mut sizes = self.sizes.borrow_mut();
            sizes.push(payload.url_list.len());
            if self.fail_chunks.contains(&sizes.len()) {
                ChunkOutcome::Rejected {
                    status: 422,
                    body: "bad".into(),
                }
            } else {
                ChunkOutcome::Accepted { status: 200 }
            }
        }
    }

    fn site() -> SiteConfig {
        SiteConfig::new("https://videos.example", "key-123", "https://api.indexnow.org/IndexNow")
            .unwrap()
    }

    fn write_videos(paths: &ProjectPaths, body: &str) {
        fs::create_dir_all(paths.source_json.parent().unwrap()).unwrap();
        fs::write(&paths.source_json, body).unwrap();
    }

    #[test]
    fn payload_serializes_with_camel_case_keys() {
        let site = site();
        let urls = vec!["https://videos.example/a-1/".to_string()];
        let payload = SubmissionPayload {
            host: &site.host,
            key: &site.key,
            key_location: &site.key_location,
            url_list: &urls,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "host": "videos.example",
                "key": "key-123",
                "keyLocation": "https://videos.example/key-123.txt",
                "urlList": ["https://videos.example/a-1/"]
            })
        );
    }

    #[test]
    fn video_urls_use_slug_and_id() {
        let videos = vec![
            VideoRecord {
                id: "42".into(),
                title: "Hello Wörld".into(),
                ..VideoRecord::default()
            },
            VideoRecord {
                id: "7".into(),
                ..VideoRecord::default()
            },
            VideoRecord {
                title: "No id".into(),
                ..VideoRecord::default()
            },
        ];
        assert_eq!(
            video_urls(&site(), &videos),
            [
                "https://videos.example/hello-world-42/",
                "https://videos.example/untitled-video-7/"
            ]
        );
    }

    #[test]
    fn twenty_five_thousand_urls_make_three_posts() {
        let urls: Vec<String> = (0..25_000)
            .map(|n| format!("https://videos.example/v-{n}/"))
            .collect();
        let submitter = RecordingSubmitter::default();
        let (accepted, failed) = submit_urls(&submitter, &site(), &urls);
        assert_eq!(*submitter.sizes.borrow(), [10_000, 10_000, 5_000]);
        assert_eq!((accepted, failed), (3, 0));
    }

    #[test]
    fn rejected_chunk_does_not_stop_later_chunks() {
        let urls: Vec<String> = (0..20_001).map(|n| format!("u{n}")).collect();
        let submitter = RecordingSubmitter {
            fail_chunks: vec![1],
            ..RecordingSubmitter::default()
        };
        let (accepted, failed) = submit_urls(&submitter, &site(), &urls);
        assert_eq!(submitter.sizes.borrow().len(), 3);
        assert_eq!((accepted, failed), (2, 1));
    }

    #[test]
    fn pending_urls_skips_cached_entries() {
        let current = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let cached = vec!["b".to_string(), "z".to_string()];
        assert_eq!(pending_urls(&current, &cached), ["a", "c"]);
    }

    #[test]
    fn corrupt_or_missing_cache_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".indexnow_cache.json");
        assert!(load_cache(&path).is_empty());
        fs::write(&path, "{not json").unwrap();
        assert!(load_cache(&path).is_empty());
    }

    #[test]
    fn second_run_with_unchanged_videos_submits_nothing() {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::from_root(dir.path());
        write_videos(
            &paths,
            r#"[{"id":"1","title":"One"},{"id":"2","title":"Two"}]"#,
        );

        let first = RecordingSubmitter::default();
        let report = run(&site(), &paths, &first, false).unwrap();
        assert_eq!(report.pending, 2);
        assert_eq!(*first.sizes.borrow(), [2]);

        let second = RecordingSubmitter::default();
        let report = run(&site(), &paths, &second, false).unwrap();
        assert_eq!(report.pending, 0);
        assert!(second.sizes.borrow().is_empty());
    }

    #[test]
    fn cache_is_rewritten_even_when_chunks_fail() {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::from_root(dir.path());
        write_videos(&paths, r#"[{"id":"1","title":"One"}]"#);
        let failing = RecordingSubmitter {
            fail_chunks: vec![1],
            ..RecordingSubmitter::default()
        };
        let report = run(&site(), &paths, &failing, false).unwrap();
        assert_eq!(report.failed_chunks, 1);
        assert_eq!(
            load_cache(&paths.indexnow_cache),
            ["https://videos.example/one-1/"]
        );
    }

    #[test]
    fn dry_run_sends_nothing_and_keeps_cache() {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::from_root(dir.path());
        write_videos(&paths, r#"[{"id":"1","title":"One"}]"#);
        let submitter = RecordingSubmitter::default();
        let report = run(&site(), &paths, &submitter, true).unwrap();
        assert_eq!(report.pending, 1);
        assert!(submitter.sizes.borrow().is_empty());
        assert!(!paths.indexnow_cache.exists());
    }

    #[test]
    fn missing_videos_file_is_fatal_and_leaves_cache_alone() {
        let dir = tempdir().unwrap();
        let paths = ProjectPaths::from_root(dir.path());
        fs::write(&paths.indexnow_cache, r#"["keep"]"#).unwrap();
        let submitter = RecordingSubmitter::default();
        assert!(run(&site(), &paths, &submitter, false).is_err());
        assert_eq!(load_cache(&paths.indexnow_cache), ["keep"]);
    }
}
