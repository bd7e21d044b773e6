// src/image.rs
//! Image templating: turns a raw media URL into embeddable `<img>` markup
//! served through an image CDN.

use std::sync::Arc;

pub const DEFAULT_CDN_BASE: &str = "https://res.cloudinary.com/canonical/image/fetch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Loading {
    #[default]
    Auto,
    Lazy,
    Eager,
}

impl Loading {
    fn as_str(self) -> &'static str {
        match self {
            Loading::Auto => "auto",
            Loading::Lazy => "lazy",
            Loading::Eager => "eager",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    /// Crop to exactly width x height.
    pub fill: bool,
    /// Add a 2x `srcset` entry.
    pub hi_def: bool,
    pub loading: Loading,
    pub alt: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 346,
            height: 231,
            fill: true,
            hi_def: true,
            loading: Loading::Auto,
            alt: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("image source URL is empty")]
    EmptySource,
    #[error("unsupported image source URL: {0}")]
    UnsupportedSource(String),
}

pub trait ImageTemplate: Send + Sync {
    fn render(&self, source_url: &str, options: &ImageOptions) -> Result<String, ImageError>;
}

pub type DynImageTemplate = Arc<dyn ImageTemplate>;

/// Cloudinary-style fetch CDN.
#[derive(Debug, Clone)]
pub struct CdnImageTemplate {
    cdn_base: String,
}

impl Default for CdnImageTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_CDN_BASE)
    }
}

impl CdnImageTemplate {
    pub fn new(cdn_base: impl Into<String>) -> Self {
        Self {
            cdn_base: cdn_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// CDN URL for `source_url` scaled to `width` x `height`.
    pub fn cdn_url(&self, source_url: &str, width: u32, height: u32, fill: bool) -> String {
        let mut params = format!("f_auto,q_auto,fl_sanitize,w_{width},h_{height}");
        if fill {
            params.push_str(",c_fill");
        }
        format!("{}/{}/{}", self.cdn_base, params, source_url)
    }
}

impl ImageTemplate for CdnImageTemplate {
    fn render(&self, source_url: &str, options: &ImageOptions) -> Result<String, ImageError> {
        let src = source_url.trim();
        if src.is_empty() {
            return Err(ImageError::EmptySource);
        }
        if !(src.starts_with("https://") || src.starts_with("http://")) {
            return Err(ImageError::UnsupportedSource(src.to_string()));
        }

        let url = self.cdn_url(src, options.width, options.height, options.fill);
        let url = html_escape::encode_double_quoted_attribute(&url);
        let alt = html_escape::encode_double_quoted_attribute(&options.alt);
        let mut out = format!(r#"<img src="{url}" alt="{alt}""#);
        if options.hi_def {
            let url_2x = self.cdn_url(
                src,
                options.width.saturating_mul(2),
                options.height.saturating_mul(2),
                options.fill,
            );
            let url_2x = html_escape::encode_double_quoted_attribute(&url_2x);
            out.push_str(&format!(r#" srcset="{url_2x} 2x""#));
        }
        out.push_str(&format!(
            r#" width="{}" height="{}" loading="{}" />"#,
            options.width,
            options.height,
            options.loading.as_str()
        ));
        Ok(out)
    }
}
