// src/fetch/mod.rs
//! Outbound HTTP: the bounded fetcher, the stale-serving response cache on
//! top of it, and a scripted fetcher for tests.

pub mod cache;
pub mod http;
pub mod mock;
pub mod request;

pub use cache::{CachedResponse, CachingFetcher, ResponseCache};
pub use http::{HttpFetcher, DEFAULT_FETCH_BOUND};
pub use mock::ScriptedFetcher;
pub use request::{FetchRequest, FetchRequestBuilder, Method, RawResponse, RequestBody, RequestKey};

use std::sync::Arc;

use async_trait::async_trait;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("the request to {url} took longer than {bound_ms} ms")]
    Timeout { url: String, bound_ms: u64 },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("invalid request for {url}: {message}")]
    InvalidRequest { url: String, message: String },
}

impl FetchError {
    /// Timeouts and transport failures may be answered from cache.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Transport { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Cancelled { url }
            | FetchError::InvalidRequest { url, .. } => url,
        }
    }
}

/// A single outbound exchange. Implementations must honour `cancel`.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchError>;
}

pub type DynFetch = Arc<dyn Fetch>;

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchError> {
        (**self).fetch(request, cancel).await
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "Outbound requests issued.");
        describe_counter!(
            "fetch_timeouts_total",
            "Outbound requests that exceeded the latency bound."
        );
        describe_counter!(
            "fetch_transport_errors_total",
            "Outbound requests that failed below HTTP."
        );
        describe_histogram!("fetch_duration_ms", "Outbound request time in milliseconds.");
        describe_counter!(
            "fetch_cache_stores_total",
            "Successful responses written to the response cache."
        );
        describe_counter!(
            "fetch_cache_stale_served_total",
            "Failed requests answered from the response cache."
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_transport_are_recoverable() {
        let t = FetchError::Timeout {
            url: "u".into(),
            bound_ms: 2000,
        };
        let tr = FetchError::Transport {
            url: "u".into(),
            message: "refused".into(),
        };
        let c = FetchError::Cancelled { url: "u".into() };
        let i = FetchError::InvalidRequest {
            url: "u".into(),
            message: "bad".into(),
        };
        assert!(t.is_recoverable());
        assert!(tr.is_recoverable());
        assert!(!c.is_recoverable());
        assert!(!i.is_recoverable());
        assert_eq!(t.to_string(), "the request to u took longer than 2000 ms");
    }
}
