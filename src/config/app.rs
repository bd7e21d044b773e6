// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::feed::FeedSettings;
use crate::fetch::DEFAULT_FETCH_BOUND;
use crate::image::{ImageOptions, DEFAULT_CDN_BASE};

pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";
pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_API_BASE_URL: &str = "FEED_API_BASE_URL";
pub const ENV_FETCH_TIMEOUT_MS: &str = "FEED_FETCH_TIMEOUT_MS";
pub const ENV_CACHE_ENABLED: &str = "FEED_CACHE_ENABLED";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
    pub feed: FeedConfig,
    pub static_posts: StaticPostsConfig,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// WordPress REST root.
    pub base_url: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://admin.insights.ubuntu.com/wp-json/wp/v2".to_string(),
            user_agent: "snap-blog-feed/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_FETCH_BOUND.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub budget: usize,
    pub series_budget: usize,
    pub primary_site_tag: String,
    pub snap_tag_prefix: String,
    pub external_base_url: String,
    pub blog_path: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let s = FeedSettings::default();
        Self {
            budget: s.budget,
            series_budget: s.series_budget,
            primary_site_tag: s.primary_site_tag,
            snap_tag_prefix: "sc:snap:".to_string(),
            external_base_url: s.external_base_url,
            blog_path: s.blog_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticPostsConfig {
    /// YAML or JSON mapping of snap name to post. Must exist.
    pub path: PathBuf,
    pub badge_url: Option<String>,
}

impl Default for StaticPostsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/blog-posts.yaml"),
            badge_url: Some("https://assets.ubuntu.com/v1/aae0f33a-omgubuntu.svg".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub cdn_base: String,
    pub width: u32,
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        let o = ImageOptions::default();
        Self {
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            width: o.width,
            height: o.height,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing feed config toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $FEED_CONFIG_PATH (must exist)
    /// 2) config/feed.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from(&default_p)?
            } else {
                Self::default()
            }
        };
        Ok(base.with_env_overrides()?.sanitized())
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(v) = env::var(ENV_API_BASE_URL) {
            if !v.trim().is_empty() {
                self.api.base_url = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var(ENV_FETCH_TIMEOUT_MS) {
            self.fetch.timeout_ms = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_FETCH_TIMEOUT_MS} must be an integer"))?;
        }
        if let Ok(v) = env::var(ENV_CACHE_ENABLED) {
            self.cache.enabled = matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(self)
    }

    /// Replace unusable values with defaults.
    fn sanitized(mut self) -> Self {
        if self.fetch.timeout_ms == 0 {
            self.fetch.timeout_ms = FetchConfig::default().timeout_ms;
        }
        let feed_defaults = FeedConfig::default();
        if self.feed.budget == 0 {
            self.feed.budget = feed_defaults.budget;
        }
        if self.feed.series_budget == 0 {
            self.feed.series_budget = feed_defaults.series_budget;
        }
        if self.image.width == 0 || self.image.height == 0 {
            let d = ImageConfig::default();
            self.image.width = d.width;
            self.image.height = d.height;
        }
        self
    }

    pub fn fetch_bound(&self) -> Duration {
        Duration::from_millis(self.fetch.timeout_ms)
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            budget: self.feed.budget,
            series_budget: self.feed.series_budget,
            primary_site_tag: self.feed.primary_site_tag.clone(),
            external_base_url: self.feed.external_base_url.clone(),
            blog_path: self.feed.blog_path.clone(),
        }
    }

    /// Display parameters for tagged-post images.
    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            width: self.image.width,
            height: self.image.height,
            ..ImageOptions::default()
        }
    }

    /// Static posts get a plain 1x image with the badge next to it.
    pub fn static_image_options(&self) -> ImageOptions {
        ImageOptions {
            hi_def: false,
            ..self.image_options()
        }
    }
}
