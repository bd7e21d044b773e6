// src/sources/tagged.rs
//! Posts pulled from the content API by tag.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{EmptyReason, SourceFailure, SourceOutcome};
use crate::content_api::{ContentApi, RawArticle};
use crate::image::{DynImageTemplate, ImageOptions};
use crate::model::{NormalizedArticle, TagId};

pub struct TaggedPosts {
    api: Arc<ContentApi>,
    templater: DynImageTemplate,
    image: ImageOptions,
}

impl TaggedPosts {
    pub fn new(api: Arc<ContentApi>, templater: DynImageTemplate, image: ImageOptions) -> Self {
        Self {
            api,
            templater,
            image,
        }
    }

    /// Resolve `tag_name`, then list up to `limit` posts with their images.
    /// Links are left as bare slugs.
    pub async fn list(&self, tag_name: &str, limit: usize, cancel: &CancellationToken) -> SourceOutcome {
        if limit == 0 {
            return SourceOutcome::Empty(EmptyReason::ZeroBudget);
        }
        match self.resolve(tag_name, cancel).await {
            Ok(tag) => self.list_by_id(tag, limit, cancel).await,
            Err(outcome) => outcome,
        }
    }

    /// Tag id for `tag_name`, or the outcome to report when there is none.
    pub async fn resolve(&self, tag_name: &str, cancel: &CancellationToken) -> Result<TagId, SourceOutcome> {
        match self.api.tag_by_name(tag_name, cancel).await {
            Ok(Some(tag)) => Ok(tag.id),
            Ok(None) => {
                debug!(tag = tag_name, "tag not found");
                Err(SourceOutcome::Empty(EmptyReason::TagNotFound {
                    tag: tag_name.to_string(),
                }))
            }
            Err(e) => {
                warn!(tag = tag_name, error = %e, "tag lookup failed");
                Err(SourceOutcome::Failed(SourceFailure::from(&e)))
            }
        }
    }

    /// Same as [`list`](Self::list) without the name lookup.
    pub async fn list_by_id(&self, tag: TagId, limit: usize, cancel: &CancellationToken) -> SourceOutcome {
        if limit == 0 {
            return SourceOutcome::Empty(EmptyReason::ZeroBudget);
        }
        let page = match self.api.articles(&[tag], limit, 1, cancel).await {
            Ok(page) => page,
            Err(e) => {
                warn!(%tag, error = %e, "article listing failed");
                return SourceOutcome::Failed(SourceFailure::from(&e));
            }
        };

        // media lookups are independent; run them side by side
        let images = join_all(
            page.articles
                .iter()
                .map(|a| self.resolve_image(a, cancel)),
        )
        .await;

        let articles = page
            .articles
            .into_iter()
            .zip(images)
            .take(limit)
            .map(|(a, image)| NormalizedArticle {
                link: a.slug,
                title: a.title,
                image,
                tags: a.tags,
            })
            .collect::<Vec<_>>();

        debug!(%tag, count = articles.len(), "tagged posts listed");
        SourceOutcome::Fetched(articles)
    }

    async fn resolve_image(&self, article: &RawArticle, cancel: &CancellationToken) -> Option<String> {
        let id = article.featured_media?;
        let media = match self.api.media(id, cancel).await {
            Ok(Some(m)) => m,
            Ok(None) => return None,
            Err(e) => {
                warn!(article = article.id, media = id, error = %e, "media lookup failed");
                return None;
            }
        };
        match self.templater.render(&media.source_url, &self.image) {
            Ok(markup) => Some(markup),
            Err(e) => {
                warn!(article = article.id, media = id, error = %e, "media not rendered");
                None
            }
        }
    }
}
