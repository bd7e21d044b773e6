// src/content_api.rs
//! Client for the blog's WordPress REST API (`/wp-json/wp/v2`).
//!
//! Payloads are decoded once here into typed records. Malformed articles are
//! dropped (missing slug) or defaulted (missing title, media, tags) so that
//! nothing downstream handles untyped JSON.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::fetch::{DynFetch, FetchError, FetchRequest, RawResponse};
use crate::model::TagId;

#[derive(Debug, thiserror::Error)]
pub enum ContentApiError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("content API returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("could not decode content API payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub id: TagId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Media {
    pub id: u64,
    pub source_url: String,
}

/// A post as listed by the API, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    pub id: u64,
    pub slug: String,
    pub title: String,
    /// `None` when the post has no featured image (the API sends 0).
    pub featured_media: Option<u64>,
    pub tags: BTreeSet<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePage {
    pub articles: Vec<RawArticle>,
    pub total_pages: u32,
}

#[derive(Deserialize)]
struct WireArticle {
    #[serde(default)]
    id: u64,
    slug: Option<String>,
    #[serde(default)]
    title: WireRendered,
    #[serde(default)]
    featured_media: Option<u64>,
    #[serde(default)]
    tags: Vec<TagId>,
}

#[derive(Default, Deserialize)]
struct WireRendered {
    #[serde(default)]
    rendered: String,
}

impl WireArticle {
    fn validate(self) -> Option<RawArticle> {
        let slug = self.slug.map(|s| s.trim().to_string()).unwrap_or_default();
        if slug.is_empty() {
            return None;
        }
        Some(RawArticle {
            id: self.id,
            slug,
            title: normalize_title(&self.title.rendered),
            featured_media: self.featured_media.filter(|id| *id != 0),
            tags: self.tags.into_iter().collect(),
        })
    }
}

/// Rendered titles arrive as HTML: decode entities, drop tags, collapse whitespace.
pub fn normalize_title(rendered: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));

    let stripped = re_tags.replace_all(rendered, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

pub struct ContentApi {
    fetcher: DynFetch,
    base_url: String,
}

impl ContentApi {
    /// `base_url` is the REST root, e.g. `https://ubuntu.com/blog/wp-json/wp/v2`.
    pub fn new(fetcher: DynFetch, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { fetcher, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look a tag up by its slug. An empty result is a miss, not an error.
    pub async fn tag_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Tag>, ContentApiError> {
        let req = FetchRequest::builder(format!("{}/tags", self.base_url))
            .query("slug", name)
            .build();
        let resp = self.send(&req, cancel).await?;
        let tags: Vec<Tag> = decode(&req, &resp)?;
        let tag = tags.into_iter().next();
        debug!(tag = name, found = tag.is_some(), "tag lookup");
        Ok(tag)
    }

    /// One page of posts carrying any of `tags`, newest first as the API orders them.
    pub async fn articles(
        &self,
        tags: &[TagId],
        per_page: usize,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<ArticlePage, ContentApiError> {
        let tag_list = tags
            .iter()
            .map(TagId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let req = FetchRequest::builder(format!("{}/posts", self.base_url))
            .query("tags", tag_list)
            .query("per_page", per_page)
            .query("page", page)
            .build();
        let resp = self.send(&req, cancel).await?;

        let items: Vec<serde_json::Value> = decode(&req, &resp)?;
        let mut articles = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<WireArticle>(item) {
                Ok(wire) => match wire.validate() {
                    Some(a) => articles.push(a),
                    None => warn!(url = %req.display_url(), "dropping article without slug"),
                },
                Err(e) => warn!(url = %req.display_url(), error = %e, "dropping malformed article"),
            }
        }

        let total_pages = resp
            .header("x-wp-totalpages")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(1);

        Ok(ArticlePage {
            articles,
            total_pages,
        })
    }

    /// Featured media lookup. Id 0 means "no media" and never hits the network.
    pub async fn media(
        &self,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<Media>, ContentApiError> {
        if id == 0 {
            return Ok(None);
        }
        let req = FetchRequest::get(format!("{}/media/{}", self.base_url, id));
        let resp = self.send(&req, cancel).await?;
        let media: Media = decode(&req, &resp)?;
        if media.source_url.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(media))
    }

    async fn send(
        &self,
        req: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, ContentApiError> {
        let resp = self.fetcher.fetch(req, cancel).await?;
        if !resp.is_success() {
            return Err(ContentApiError::Status {
                url: req.display_url(),
                status: resp.status,
            });
        }
        Ok(resp)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    req: &FetchRequest,
    resp: &RawResponse,
) -> Result<T, ContentApiError> {
    resp.json().map_err(|source| ContentApiError::Decode {
        url: req.display_url(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ScriptedFetcher;
    use std::sync::Arc;

    const BASE: &str = "https://api.test/wp/v2";

    fn api(fetcher: &Arc<ScriptedFetcher>) -> ContentApi {
        ContentApi::new(fetcher.clone(), format!("{BASE}/"))
    }

    #[test]
    fn titles_are_decoded_and_stripped() {
        assert_eq!(
            normalize_title("  Snaps &amp; <em>you</em>&#8217;re  done\n"),
            "Snaps & you\u{2019}re done"
        );
    }

    #[tokio::test]
    async fn tag_lookup_miss_is_none() {
        let f = Arc::new(ScriptedFetcher::new());
        f.on("/tags", Ok(RawResponse::new(200, "[]")));
        let tag = api(&f)
            .tag_by_name("sc:snap:nope", &CancellationToken::new())
            .await
            .unwrap();
        assert!(tag.is_none());
        assert_eq!(f.calls()[0].query_value("slug"), Some("sc:snap:nope"));
    }

    #[tokio::test]
    async fn articles_are_validated_and_defaulted() {
        let f = Arc::new(ScriptedFetcher::new());
        let body = r#"[
            {"id": 1, "slug": "one", "title": {"rendered": "One"}, "featured_media": 9, "tags": [5, 6]},
            {"id": 2, "title": {"rendered": "No slug"}},
            {"id": 3, "slug": "three", "featured_media": 0},
            "garbage"
        ]"#;
        f.on(
            "/posts",
            Ok(RawResponse::new(200, body).with_header("X-WP-TotalPages", "4")),
        );

        let page = api(&f)
            .articles(&[TagId(5)], 3, 1, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.total_pages, 4);
        assert_eq!(page.articles.len(), 2);
        assert_eq!(page.articles[0].featured_media, Some(9));
        assert_eq!(page.articles[0].tags, BTreeSet::from([TagId(5), TagId(6)]));
        assert_eq!(page.articles[1].slug, "three");
        assert_eq!(page.articles[1].title, "");
        assert_eq!(page.articles[1].featured_media, None);

        let call = &f.calls()[0];
        assert_eq!(call.url(), "https://api.test/wp/v2/posts");
        assert_eq!(call.query_value("per_page"), Some("3"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let f = Arc::new(ScriptedFetcher::new());
        f.on("/posts", Ok(RawResponse::new(500, "oops")));
        let err = api(&f)
            .articles(&[TagId(5)], 3, 1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ContentApiError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn media_zero_skips_network() {
        let f = Arc::new(ScriptedFetcher::new());
        let media = api(&f).media(0, &CancellationToken::new()).await.unwrap();
        assert!(media.is_none());
        assert!(f.calls().is_empty());
    }
}
