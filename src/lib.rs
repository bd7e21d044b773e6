// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod content_api;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod image;
pub mod metrics;
pub mod model;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::feed::{AggregatedFeed, FeedBuilder, FeedSettings, SeriesFeed};
pub use crate::model::{NormalizedArticle, TagId};

/// Build the full router from configuration (static posts file, HTTP
/// fetcher, response cache).
pub fn app(cfg: &AppConfig) -> anyhow::Result<axum::Router> {
    let state = AppState::from_config(cfg)?;
    Ok(router(state))
}
