//! Thumbnail materialization: turns a record's thumbnail source into an
//! optimized WebP file under `public/picture`.
//!
//! Each record is handled in isolation and always yields a
//! [`Materialization`]; failures become a [`Materialization::Fallback`] with
//! the placeholder image instead of aborting the batch. Side effects go
//! through two small collaborators, [`ArtifactStore`] and [`ImageSource`], so
//! the skip/fetch/fallback policy can be exercised without disk or network.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use image::{DynamicImage, ImageReader, imageops::FilterType};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::metadata::{ProcessedVideoRecord, VideoRecord};
use crate::slug;

pub const PLACEHOLDER_THUMBNAIL_PATH: &str = "/placeholder.webp";
pub const FALLBACK_WIDTH: u32 = 300;
pub const FALLBACK_HEIGHT: u32 = 168;
pub const DEFAULT_TARGET_WIDTH: u32 = 300;
pub const DEFAULT_WEBP_QUALITY: u8 = 70;
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_DOWNLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const FALLBACK: Self = Self {
        width: FALLBACK_WIDTH,
        height: FALLBACK_HEIGHT,
    };

    /// Zero-sized axes are replaced by the fallback value.
    fn or_fallback(self) -> Self {
        Self {
            width: if self.width == 0 { FALLBACK_WIDTH } else { self.width },
            height: if self.height == 0 { FALLBACK_HEIGHT } else { self.height },
        }
    }
}

/// A thumbnail file present on disk and how the site references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub public_path: String,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The record has no thumbnail source at all.
    NoSource,
    /// Fetching, decoding, encoding or writing failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialization {
    /// The artifact already existed; nothing was fetched or encoded.
    Reused(Artifact),
    Created(Artifact),
    Fallback(FallbackReason),
}

impl Materialization {
    /// Path and dimensions to publish for this outcome.
    pub fn thumbnail(&self) -> (&str, Dimensions) {
        match self {
            Self::Reused(artifact) | Self::Created(artifact) => {
                (artifact.public_path.as_str(), artifact.dimensions)
            }
            Self::Fallback(_) => (PLACEHOLDER_THUMBNAIL_PATH, Dimensions::FALLBACK),
        }
    }

    pub fn apply(&self, video: &VideoRecord) -> ProcessedVideoRecord {
        let (path, dimensions) = self.thumbnail();
        ProcessedVideoRecord::from_source(
            video,
            path.to_string(),
            dimensions.width,
            dimensions.height,
        )
    }
}

/// Where optimized thumbnails live. `exists` is the idempotency check: an
/// existing artifact is never regenerated.
pub trait ArtifactStore: Sync {
    fn exists(&self, path: &Path) -> bool;
    fn dimensions(&self, path: &Path) -> Result<Dimensions>;
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Where source images come from.
pub trait ImageSource: Sync {
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>>;
    fn read_local(&self, path: &Path) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactStore;

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dimensions(&self, path: &Path) -> Result<Dimensions> {
        let (width, height) = ImageReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("detecting format of {}", path.display()))?
            .into_dimensions()
            .with_context(|| format!("reading dimensions of {}", path.display()))?;
        Ok(Dimensions { width, height })
    }

    /// Writes through a temporary file in the same directory so an
    /// interrupted run never leaves a truncated artifact behind.
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))?;
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temporary file in {}", dir.display()))?;
        staged
            .write_all(bytes)
            .with_context(|| format!("writing {}", staged.path().display()))?;
        staged
            .persist(path)
            .with_context(|| format!("moving thumbnail into {}", path.display()))?;
        Ok(())
    }
}

/// Blocking HTTP fetcher plus plain filesystem reads.
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpImageSource {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("video-catalog-tools/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            max_bytes: MAX_DOWNLOAD_BYTES,
        }
    }
}

impl ImageSource for HttpImageSource {
    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.agent.get(url).call().map_err(|err| match err {
            ureq::Error::Status(code, response) => {
                anyhow!("download failed: HTTP {code} {}", response.status_text())
            }
            ureq::Error::Transport(transport) => anyhow!("download failed: {transport}"),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .context("reading download body")?;
        if bytes.len() as u64 > self.max_bytes {
            bail!("download exceeds {} bytes", self.max_bytes);
        }
        Ok(bytes)
    }

    fn read_local(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("local thumbnail {} not readable", path.display()))
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailSettings {
    /// Directory optimized thumbnails are written to.
    pub output_dir: PathBuf,
    /// Root that local thumbnail sources are resolved against.
    pub public_dir: PathBuf,
    /// Site-relative prefix of `output_dir`, e.g. `/picture`.
    pub url_prefix: String,
    pub target_width: u32,
    pub quality: u8,
}

pub struct Materializer<'a, S, I> {
    settings: ThumbnailSettings,
    store: &'a S,
    source: &'a I,
}

impl<'a, S: ArtifactStore, I: ImageSource> Materializer<'a, S, I> {
    pub fn new(settings: ThumbnailSettings, store: &'a S, source: &'a I) -> Self {
        Self {
            settings,
            store,
            source,
        }
    }

    pub fn materialize(&self, video: &VideoRecord) -> Materialization {
        let file_name = slug::thumbnail_file_name(&video.title, &video.id);
        let output = self.settings.output_dir.join(&file_name);
        let public_path = format!(
            "{}/{}",
            self.settings.url_prefix.trim_end_matches('/'),
            file_name
        );

        if self.store.exists(&output) {
            let dimensions = match self.store.dimensions(&output) {
                Ok(dimensions) => dimensions.or_fallback(),
                Err(err) => {
                    warn!(
                        file = %file_name,
                        error = %format!("{err:#}"),
                        "could not read existing thumbnail, using fallback dimensions"
                    );
                    Dimensions::FALLBACK
                }
            };
            debug!(file = %file_name, "thumbnail already exists, skipping");
            return Materialization::Reused(Artifact {
                public_path,
                dimensions,
            });
        }

        let Some(source) = video
            .thumbnail
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            warn!(id = %video.id, title = %video.title, "no thumbnail source, using placeholder");
            return Materialization::Fallback(FallbackReason::NoSource);
        };

        match self.produce(source, &output) {
            Ok(dimensions) => {
                info!(
                    path = %output.display(),
                    width = dimensions.width,
                    height = dimensions.height,
                    "thumbnail saved"
                );
                Materialization::Created(Artifact {
                    public_path,
                    dimensions,
                })
            }
            Err(err) => {
                let reason = format!("{err:#}");
                error!(id = %video.id, title = %video.title, error = %reason, "thumbnail processing failed");
                Materialization::Fallback(FallbackReason::Failed(reason))
            }
        }
    }

    fn produce(&self, source: &str, output: &Path) -> Result<Dimensions> {
        let original = if is_remote(source) {
            info!(url = source, "downloading thumbnail");
            self.source.fetch_remote(source)?
        } else {
            let local = resolve_local(&self.settings.public_dir, source)?;
            debug!(path = %local.display(), "using local thumbnail");
            self.source.read_local(&local)?
        };

        let encoded = encode_thumbnail(&original, self.settings.target_width, self.settings.quality)?;
        let dimensions = probe_dimensions(&encoded)?.or_fallback();
        self.store.write(output, &encoded)?;
        Ok(dimensions)
    }
}

pub fn is_remote(source: &str) -> bool {
    let lowered = source.to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// Joins a site-relative source path onto the public directory, refusing
/// anything that would step outside it.
pub fn resolve_local(public_dir: &Path, source: &str) -> Result<PathBuf> {
    let relative = Path::new(source.trim_start_matches(['/', '\\']));
    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        bail!("thumbnail path {source:?} is outside the public directory");
    }
    Ok(public_dir.join(relative))
}

/// Decodes `bytes`, shrinks to `target_width` (never enlarges) keeping the
/// aspect ratio, and encodes lossy WebP.
pub fn encode_thumbnail(bytes: &[u8], target_width: u32, quality: u8) -> Result<Vec<u8>> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("detecting thumbnail format")?
        .decode()
        .context("decoding thumbnail")?;

    let resized = if img.width() > target_width {
        let height = (f64::from(img.height()) * f64::from(target_width) / f64::from(img.width()))
            .round()
            .max(1.0) as u32;
        img.resize_exact(target_width, height, FilterType::Lanczos3)
    } else {
        img
    };

    encode_webp(&resized, quality)
}

fn encode_webp(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let (width, height) = (img.width(), img.height());
    let quality = f32::from(quality.clamp(1, 100));
    let encoded = if img.color().has_alpha() {
        let rgba = img.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, quality)
    } else {
        let rgb = img.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, quality)
    };
    encoded
        .map(|memory| memory.to_vec())
        .map_err(|err| anyhow!("encoding WebP {width}x{height} failed: {err:?}"))
}

pub fn probe_dimensions(bytes: &[u8]) -> Result<Dimensions> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("detecting encoded thumbnail format")?
        .into_dimensions()
        .context("reading encoded thumbnail dimensions")?;
    Ok(Dimensions { width, height })
}
