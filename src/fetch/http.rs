// src/fetch/http.rs
//! The only component that talks to the network.
//!
//! Every exchange (connect, send, body read) runs under one fixed bound.
//! There are no retries; callers decide how to degrade.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ensure_metrics_described, Fetch, FetchError, FetchRequest, RawResponse, RequestBody};

pub const DEFAULT_FETCH_BOUND: Duration = Duration::from_millis(2000);

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    bound: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, bound: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self::with_client(client, bound))
    }

    pub fn with_client(client: Client, bound: Duration) -> Self {
        Self { client, bound }
    }

    pub fn bound(&self) -> Duration {
        self.bound
    }

    async fn exchange(&self, request: &FetchRequest) -> reqwest::Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .query(request.query());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(v) => builder.json(v),
            RequestBody::Form(pairs) => builder.form(pairs),
        };

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect::<BTreeMap<_, _>>();
        let body = resp.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchError> {
        ensure_metrics_described();
        let url = request.display_url();
        let bound_ms = self.bound.as_millis() as u64;

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled { url });
        }

        counter!("fetch_requests_total").increment(1);
        let t0 = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(%url, "fetch cancelled");
                return Err(FetchError::Cancelled { url });
            }
            res = tokio::time::timeout(self.bound, self.exchange(request)) => res,
        };

        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("fetch_duration_ms").record(elapsed_ms);

        match outcome {
            Err(_) => {
                counter!("fetch_timeouts_total").increment(1);
                warn!(%url, bound_ms, "fetch timed out");
                Err(FetchError::Timeout { url, bound_ms })
            }
            Ok(Err(e)) if e.is_builder() => Err(FetchError::InvalidRequest {
                url,
                message: e.to_string(),
            }),
            Ok(Err(e)) => {
                counter!("fetch_transport_errors_total").increment(1);
                warn!(%url, error = %e, "fetch transport error");
                Err(FetchError::Transport {
                    url,
                    message: e.to_string(),
                })
            }
            Ok(Ok(resp)) => {
                debug!(%url, status = resp.status, elapsed_ms, "fetched");
                Ok(resp)
            }
        }
    }
}
