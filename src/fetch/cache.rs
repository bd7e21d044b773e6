// src/fetch/cache.rs
//! Stale-while-revalidate response cache.
//!
//! Every call goes to the network first. A successful (2xx) answer replaces
//! the cached entry for its request key; a timeout or transport failure is
//! answered with the last good entry when one exists. Entries never expire:
//! "stale" means "last known good", and they live as long as the process.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ensure_metrics_described, Fetch, FetchError, FetchRequest, RawResponse, RequestKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub key: RequestKey,
    pub response: RawResponse,
    pub received_at: DateTime<Utc>,
}

/// Process-wide response store shared by every aggregation.
///
/// Entries are replaced whole under the write lock, so a reader never sees a
/// partially written response. Concurrent writers for one key: last one wins.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<RequestKey, Arc<CachedResponse>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RequestKey) -> Option<Arc<CachedResponse>> {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(key).cloned()
    }

    pub fn store(&self, key: RequestKey, response: RawResponse) -> Arc<CachedResponse> {
        let entry = Arc::new(CachedResponse {
            key: key.clone(),
            response,
            received_at: Utc::now(),
        });
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key, Arc::clone(&entry));
        entry
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Wraps any [`Fetch`] with the stale-serve policy.
pub struct CachingFetcher<F> {
    inner: F,
    cache: Arc<ResponseCache>,
    enabled: bool,
}

impl<F: Fetch> CachingFetcher<F> {
    pub fn new(inner: F, cache: Arc<ResponseCache>) -> Self {
        Self {
            inner,
            cache,
            enabled: true,
        }
    }

    /// With `false` the layer is a plain pass-through.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

#[async_trait]
impl<F: Fetch> Fetch for CachingFetcher<F> {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchError> {
        if !self.enabled {
            return self.inner.fetch(request, cancel).await;
        }
        ensure_metrics_described();
        let key = request.key();

        match self.inner.fetch(request, cancel).await {
            Ok(resp) => {
                if resp.is_success() {
                    self.cache.store(key.clone(), resp.clone());
                    counter!("fetch_cache_stores_total").increment(1);
                    debug!(%key, url = %request.display_url(), "cached response refreshed");
                }
                Ok(resp)
            }
            Err(err) if err.is_recoverable() => match self.cache.get(&key) {
                Some(hit) => {
                    let age_secs = (Utc::now() - hit.received_at).num_seconds();
                    counter!("fetch_cache_stale_served_total").increment(1);
                    warn!(
                        %key,
                        url = %request.display_url(),
                        error = %err,
                        age_secs,
                        "serving stale response"
                    );
                    Ok(hit.response.clone())
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}
