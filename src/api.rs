// src/api.rs
//! HTTP surface: two read-only feed endpoints plus a health check.
//!
//! Feed endpoints answer 200 whatever the upstream state; the
//! `X-Feed-Degraded` header names the lookups that failed ("none" otherwise).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{load_static_posts, AppConfig};
use crate::content_api::ContentApi;
use crate::error::{ApiError, FeedError};
use crate::feed::FeedBuilder;
use crate::fetch::{CachingFetcher, DynFetch, HttpFetcher, ResponseCache};
use crate::image::{CdnImageTemplate, DynImageTemplate};
use crate::sources::{StaticPost, StaticPosts};

pub const DEGRADED_HEADER: &str = "x-feed-degraded";

/// The content API caps `per_page` at 100.
pub const MAX_BUDGET: usize = 100;

#[derive(Clone)]
pub struct AppState {
    feed: Arc<FeedBuilder>,
    snap_tag_prefix: String,
}

impl AppState {
    /// Production wiring: bounded HTTP fetcher behind the shared response cache.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let posts = load_static_posts(&cfg.static_posts.path)?;
        let http = HttpFetcher::new(&cfg.api.user_agent, cfg.fetch_bound())
            .context("building HTTP client")?;
        let cache = Arc::new(ResponseCache::new());
        let fetcher: DynFetch =
            Arc::new(CachingFetcher::new(http, cache).enabled(cfg.cache.enabled));
        tracing::info!(
            base_url = %cfg.api.base_url,
            bound_ms = cfg.fetch.timeout_ms,
            cache = cfg.cache.enabled,
            static_posts = posts.len(),
            "feed state ready"
        );
        Ok(Self::with_fetcher(cfg, fetcher, posts))
    }

    /// Wiring with a caller-supplied fetcher (tests, alternative transports).
    pub fn with_fetcher(
        cfg: &AppConfig,
        fetcher: DynFetch,
        posts: HashMap<String, StaticPost>,
    ) -> Self {
        let api = Arc::new(ContentApi::new(fetcher, cfg.api.base_url.clone()));
        let templater: DynImageTemplate =
            Arc::new(CdnImageTemplate::new(cfg.image.cdn_base.clone()));
        let statics = StaticPosts::new(posts, Arc::clone(&templater), cfg.static_image_options())
            .with_badge(cfg.static_posts.badge_url.clone());
        let feed = FeedBuilder::new(
            api,
            statics,
            templater,
            cfg.image_options(),
            cfg.feed_settings(),
        );
        Self {
            feed: Arc::new(feed),
            snap_tag_prefix: cfg.feed.snap_tag_prefix.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/snap-posts/{snap}", get(snap_posts))
        .route("/api/series/{series}", get(series_posts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<i64>,
}

fn resolve_budget(limit: Option<i64>, default: usize) -> Result<usize, FeedError> {
    match limit {
        None => Ok(default.min(MAX_BUDGET)),
        Some(n) if n >= 1 => Ok(usize::try_from(n).unwrap_or(MAX_BUDGET).min(MAX_BUDGET)),
        Some(n) => Err(FeedError::InvalidBudget(n)),
    }
}

fn degraded_header(sources: &[&str]) -> String {
    if sources.is_empty() {
        "none".to_string()
    } else {
        sources.join(",")
    }
}

async fn snap_posts(
    State(state): State<AppState>,
    Path(snap): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let budget = resolve_budget(q.limit, state.feed.settings().budget)?;
    if snap.trim().is_empty() {
        return Err(ApiError::BadRequest("snap name must not be empty".to_string()));
    }

    // dropping the handler future cancels whatever is still in flight
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let tag = format!("{}{}", state.snap_tag_prefix, snap);
    let feed = state.feed.build_feed(&snap, &tag, budget, &cancel).await?;
    let degraded = degraded_header(&feed.degraded_sources());

    Ok(([(DEGRADED_HEADER, degraded)], Json(feed.articles)))
}

async fn series_posts(
    State(state): State<AppState>,
    Path(series): Path<String>,
    Query(q): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let budget = resolve_budget(q.limit, state.feed.settings().series_budget)?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let series = state.feed.build_series(&series, budget, &cancel).await?;
    let degraded = if series.status.is_failed() {
        degraded_header(&["series"])
    } else {
        degraded_header(&[])
    };

    Ok(([(DEGRADED_HEADER, degraded)], Json(series.articles)))
}
