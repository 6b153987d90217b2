use anyhow::{Context, Result, anyhow, bail};
use std::{
    fs,
    path::{Path, PathBuf},
};
use url::Url;

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_INDEXNOW_ENDPOINT: &str = "https://api.indexnow.org/IndexNow";

pub const SOURCE_JSON_PATH: &str = "src/data/videos.json";
pub const CATALOG_MODULE_PATH: &str = "src/data/allVideos.ts";
pub const PUBLIC_SUBDIR: &str = "public";
pub const PICTURE_SUBDIR: &str = "picture";
pub const PROCESSED_JSON_FILE: &str = "processedVideos.json";
pub const INDEXNOW_CACHE_FILE: &str = ".indexnow_cache.json";

const SITE_URL_KEY: &str = "PUBLIC_SITE_URL";
const INDEXNOW_KEY_KEY: &str = "INDEXNOW_KEY";
const INDEXNOW_ENDPOINT_KEY: &str = "INDEXNOW_ENDPOINT";

/// Raw values gathered from the `.env` file and the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    pub public_site_url: Option<String>,
    pub indexnow_key: Option<String>,
    pub indexnow_endpoint: Option<String>,
}

impl EnvConfig {
    fn set(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match key {
            SITE_URL_KEY => self.public_site_url = Some(value.to_string()),
            INDEXNOW_KEY_KEY => self.indexnow_key = Some(value.to_string()),
            INDEXNOW_ENDPOINT_KEY => self.indexnow_endpoint = Some(value.to_string()),
            _ => {}
        }
    }

    /// Process environment wins over whatever the `.env` file provided.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        for key in [SITE_URL_KEY, INDEXNOW_KEY_KEY, INDEXNOW_ENDPOINT_KEY] {
            if let Some(value) = lookup(key) {
                self.set(key, value.trim());
            }
        }
        self
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"').trim_matches('\'');
            cfg.set(key.trim(), value);
        }
    }
    Ok(Some(cfg))
}

/// Reads `<root>/.env` (if any) and overlays the given environment lookup.
pub fn load_env_config<F>(root: &Path, lookup: F) -> Result<EnvConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let from_file = read_env_config(&root.join(DEFAULT_ENV_FILE))?.unwrap_or_default();
    Ok(from_file.overlay(lookup))
}

/// Everything the IndexNow notifier needs to know about the deployed site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Canonical origin without a trailing slash, e.g. `https://example.com`.
    pub site_url: String,
    pub host: String,
    pub key: String,
    pub key_location: String,
    pub endpoint: String,
}

impl SiteConfig {
    pub fn new(site_url: &str, key: &str, endpoint: &str) -> Result<Self> {
        let site_url = site_url.trim().trim_end_matches('/').to_string();
        let parsed =
            Url::parse(&site_url).with_context(|| format!("Parsing site URL {site_url}"))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow!("Site URL {site_url} has no host"))?
            .to_string();
        let key = key.trim();
        if key.is_empty() {
            bail!("IndexNow key must not be empty");
        }
        Url::parse(endpoint).with_context(|| format!("Parsing IndexNow endpoint {endpoint}"))?;
        Ok(Self {
            key_location: format!("{site_url}/{key}.txt"),
            key: key.to_string(),
            endpoint: endpoint.to_string(),
            host,
            site_url,
        })
    }

    pub fn from_env(cfg: &EnvConfig) -> Result<Self> {
        let site_url = cfg
            .public_site_url
            .as_deref()
            .ok_or_else(|| anyhow!("{SITE_URL_KEY} is not defined; set it in the environment or .env"))?;
        let key = cfg
            .indexnow_key
            .as_deref()
            .ok_or_else(|| anyhow!("{INDEXNOW_KEY_KEY} is not defined; set it in the environment or .env"))?;
        let endpoint = cfg
            .indexnow_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_INDEXNOW_ENDPOINT);
        Self::new(site_url, key, endpoint)
    }
}

/// Every project-relative location the build tools read or write.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub source_json: PathBuf,
    pub public_dir: PathBuf,
    pub picture_dir: PathBuf,
    pub catalog_module: PathBuf,
    pub processed_json: PathBuf,
    pub indexnow_cache: PathBuf,
}

impl ProjectPaths {
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let public_dir = root.join(PUBLIC_SUBDIR);
        Self {
            source_json: root.join(SOURCE_JSON_PATH),
            picture_dir: public_dir.join(PICTURE_SUBDIR),
            catalog_module: root.join(CATALOG_MODULE_PATH),
            processed_json: public_dir.join(PROCESSED_JSON_FILE),
            indexnow_cache: root.join(INDEXNOW_CACHE_FILE),
            public_dir,
            root,
        }
    }

    /// Site-relative URL prefix of optimized thumbnails, e.g. `/picture`.
    pub fn picture_url_prefix(&self) -> String {
        format!("/{PICTURE_SUBDIR}")
    }

    /// Creates the output directories for thumbnails and the catalog module.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.picture_dir)
            .with_context(|| format!("creating {}", self.picture_dir.display()))?;
        if let Some(parent) = self.catalog_module.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        Ok(())
    }
}
