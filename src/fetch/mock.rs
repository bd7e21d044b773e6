// src/fetch/mock.rs
//! In-process [`Fetch`] double: answers from a script instead of the network.
//! Used by unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Fetch, FetchError, FetchRequest, RawResponse};

type Outcome = Result<RawResponse, FetchError>;

struct Route {
    url_suffix: String,
    query: Option<(String, String)>,
    // the last outcome is sticky once the queue drains to one
    outcomes: VecDeque<Outcome>,
}

impl Route {
    fn matches(&self, request: &FetchRequest) -> bool {
        if !request.url().ends_with(&self.url_suffix) {
            return false;
        }
        match &self.query {
            Some((k, v)) => request.query_value(k) == Some(v.as_str()),
            None => true,
        }
    }

    fn next(&mut self) -> Outcome {
        if self.outcomes.len() > 1 {
            if let Some(outcome) = self.outcomes.pop_front() {
                return outcome;
            }
        }
        self.outcomes
            .front()
            .cloned()
            .unwrap_or_else(|| Err(unscripted(&self.url_suffix)))
    }
}

fn unscripted(url: &str) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: "no scripted response".to_string(),
    }
}

/// Routes are matched by URL suffix, optionally narrowed by one query pair.
/// A route with a query constraint wins over one without.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for requests whose URL ends with `url_suffix`.
    pub fn on(&self, url_suffix: &str, outcome: Outcome) -> &Self {
        self.push(url_suffix, None, outcome, false);
        self
    }

    /// Like [`on`](Self::on), but only when query `name` equals `value`.
    pub fn on_query(&self, url_suffix: &str, name: &str, value: &str, outcome: Outcome) -> &Self {
        self.push(
            url_suffix,
            Some((name.to_string(), value.to_string())),
            outcome,
            false,
        );
        self
    }

    /// Drop whatever was queued for `url_suffix` and answer with `outcome`.
    pub fn on_replace(&self, url_suffix: &str, outcome: Outcome) -> &Self {
        self.push(url_suffix, None, outcome, true);
        self
    }

    fn push(
        &self,
        url_suffix: &str,
        query: Option<(String, String)>,
        outcome: Outcome,
        replace: bool,
    ) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.url_suffix == url_suffix && r.query == query)
        {
            if replace {
                route.outcomes.clear();
            }
            route.outcomes.push_back(outcome);
            return;
        }
        routes.push(Route {
            url_suffix: url_suffix.to_string(),
            query,
            outcomes: VecDeque::from([outcome]),
        });
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests whose URL ends with `url_suffix`.
    pub fn call_count(&self, url_suffix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.url().ends_with(url_suffix))
            .count()
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, FetchError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: request.display_url(),
            });
        }

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let idx = routes
            .iter()
            .position(|r| r.query.is_some() && r.matches(request))
            .or_else(|| routes.iter().position(|r| r.matches(request)));
        match idx {
            Some(i) => routes[i].next(),
            None => Err(unscripted(&request.display_url())),
        }
    }
}
