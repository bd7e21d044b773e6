// src/feed.rs
//! Feed assembly: static posts first, tagged posts after, capped at a budget.
//!
//! Placement is fixed (no date or score blending) so curated entries always
//! land in the first slot. Tagged posts that do not carry the site's own tag
//! live on the main blog and get an absolute link there.

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::content_api::ContentApi;
use crate::error::FeedError;
use crate::image::{DynImageTemplate, ImageOptions};
use crate::model::{NormalizedArticle, TagId};
use crate::sources::{SourceFailure, SourceOutcome, SourceStatus, StaticPosts, TaggedPosts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub budget: usize,
    pub series_budget: usize,
    /// Tag slug marking posts that belong to this site.
    pub primary_site_tag: String,
    pub external_base_url: String,
    pub blog_path: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            budget: 3,
            series_budget: 12,
            primary_site_tag: "snapcraft.io".to_string(),
            external_base_url: "https://ubuntu.com".to_string(),
            blog_path: "/blog".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryTag {
    Resolved(TagId),
    NotFound,
    Failed(SourceFailure),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedFeed {
    pub articles: Vec<NormalizedArticle>,
    pub static_source: SourceStatus,
    pub tagged_source: SourceStatus,
    pub primary_tag: PrimaryTag,
}

impl AggregatedFeed {
    /// Names of the lookups that failed while building this feed.
    pub fn degraded_sources(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.static_source.is_failed() {
            out.push("static");
        }
        if self.tagged_source.is_failed() {
            out.push("tagged");
        }
        if matches!(self.primary_tag, PrimaryTag::Failed(_)) {
            out.push("primary_tag");
        }
        out
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesFeed {
    pub articles: Vec<NormalizedArticle>,
    pub status: SourceStatus,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_builds_total", "Feeds assembled, by kind.");
        describe_counter!(
            "feed_source_degraded_total",
            "Feed sources that failed and were left out, by source."
        );
    });
}

fn record_degraded(source: &'static str, failure: &SourceFailure) {
    counter!("feed_source_degraded_total", "source" => source).increment(1);
    warn!(source, reason = %failure, "feed source degraded");
}

pub struct FeedBuilder {
    api: Arc<ContentApi>,
    statics: StaticPosts,
    tagged: TaggedPosts,
    settings: FeedSettings,
}

impl FeedBuilder {
    pub fn new(
        api: Arc<ContentApi>,
        statics: StaticPosts,
        templater: DynImageTemplate,
        image: ImageOptions,
        settings: FeedSettings,
    ) -> Self {
        let tagged = TaggedPosts::new(Arc::clone(&api), templater, image);
        Self {
            api,
            statics,
            tagged,
            settings,
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Static entry for `static_key` (truncated first if over budget), then
    /// posts tagged `tag_name` filling what is left.
    pub async fn build_feed(
        &self,
        static_key: &str,
        tag_name: &str,
        budget: usize,
        cancel: &CancellationToken,
    ) -> Result<AggregatedFeed, FeedError> {
        if budget == 0 {
            return Err(FeedError::InvalidBudget(0));
        }
        ensure_metrics_described();
        counter!("feed_builds_total", "kind" => "snap").increment(1);

        let (mut articles, static_source) = self.statics.list(static_key).into_parts();
        articles.truncate(budget);
        let remaining = budget - articles.len();

        let (tagged_source, primary_tag) = if remaining == 0 {
            (SourceStatus::Skipped, PrimaryTag::Skipped)
        } else {
            match self.tagged.resolve(tag_name, cancel).await {
                Ok(tag) => {
                    let (outcome, primary) = tokio::join!(
                        self.tagged.list_by_id(tag, remaining, cancel),
                        self.resolve_primary_tag(cancel),
                    );
                    let (tagged, status) = outcome.into_parts();
                    for article in tagged {
                        articles.push(NormalizedArticle {
                            link: self.tagged_link(&article.link, &article.tags, &primary),
                            ..article
                        });
                    }
                    (status, primary)
                }
                // no snap tag, nothing to rewrite
                Err(outcome) => (outcome.into_parts().1, PrimaryTag::Skipped),
            }
        };

        if let SourceStatus::Failed(f) = &tagged_source {
            record_degraded("tagged", f);
        }
        if let PrimaryTag::Failed(f) = &primary_tag {
            record_degraded("primary_tag", f);
        }

        articles.truncate(budget);
        info!(
            static_key,
            tag = tag_name,
            budget,
            count = articles.len(),
            "feed built"
        );

        Ok(AggregatedFeed {
            articles,
            static_source,
            tagged_source,
            primary_tag,
        })
    }

    /// Posts in a series. The key is the tag id itself, so there is no name
    /// lookup; links stay relative and no images are fetched.
    pub async fn build_series(
        &self,
        series_key: &str,
        budget: usize,
        cancel: &CancellationToken,
    ) -> Result<SeriesFeed, FeedError> {
        if budget == 0 {
            return Err(FeedError::InvalidBudget(0));
        }
        ensure_metrics_described();
        counter!("feed_builds_total", "kind" => "series").increment(1);

        let outcome = match series_key.parse::<TagId>() {
            Ok(tag) => self.list_series(tag, budget, cancel).await,
            Err(_) => SourceOutcome::Failed(SourceFailure::InvalidQueryKey(series_key.to_string())),
        };
        let (articles, status) = outcome.into_parts();
        if let SourceStatus::Failed(f) = &status {
            record_degraded("series", f);
        }
        info!(series = series_key, budget, count = articles.len(), "series built");

        Ok(SeriesFeed { articles, status })
    }

    async fn list_series(&self, tag: TagId, budget: usize, cancel: &CancellationToken) -> SourceOutcome {
        match self.api.articles(&[tag], budget, 1, cancel).await {
            Ok(page) => SourceOutcome::Fetched(
                page.articles
                    .into_iter()
                    .take(budget)
                    .map(|a| NormalizedArticle {
                        link: a.slug,
                        title: a.title,
                        image: None,
                        tags: a.tags,
                    })
                    .collect(),
            ),
            Err(e) => SourceOutcome::Failed(SourceFailure::from(&e)),
        }
    }

    async fn resolve_primary_tag(&self, cancel: &CancellationToken) -> PrimaryTag {
        match self.api.tag_by_name(&self.settings.primary_site_tag, cancel).await {
            Ok(Some(tag)) => PrimaryTag::Resolved(tag.id),
            Ok(None) => PrimaryTag::NotFound,
            Err(e) => PrimaryTag::Failed(SourceFailure::from(&e)),
        }
    }

    /// Relative when the post carries the site tag, absolute otherwise. An
    /// unresolved site tag counts as "not carried".
    fn tagged_link(&self, slug: &str, tags: &BTreeSet<TagId>, primary: &PrimaryTag) -> String {
        let relative = format!(
            "{}/{}",
            self.settings.blog_path.trim_end_matches('/'),
            slug.trim_start_matches('/')
        );
        match primary {
            PrimaryTag::Resolved(id) if tags.contains(id) => relative,
            _ => format!(
                "{}{}",
                self.settings.external_base_url.trim_end_matches('/'),
                relative
            ),
        }
    }
}
