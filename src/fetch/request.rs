// src/fetch/request.rs
//! Outbound request/response values and the request identity used as cache key.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

pub use reqwest::Method;

/// Payload attached to an outbound request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Canonical bytes used for request identity.
    fn identity_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Empty => Vec::new(),
            // serde_json maps are ordered by key, so this is stable.
            RequestBody::Json(v) => serde_json::to_vec(v).unwrap_or_default(),
            RequestBody::Form(pairs) => {
                let mut out = Vec::new();
                for (k, v) in pairs {
                    push_field(&mut out, k.as_bytes());
                    push_field(&mut out, v.as_bytes());
                }
                out
            }
        }
    }
}

/// Length-prefixed so that no two field sequences share an encoding.
fn push_field(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Stable identity of a request: hex SHA-256 over method, url, query,
/// normalized headers and body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 12 hex chars are plenty for log correlation
        f.write_str(&self.0[..self.0.len().min(12)])
    }
}

/// An immutable outbound request. Build one with [`FetchRequest::builder`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl FetchRequest {
    pub fn builder(url: impl Into<String>) -> FetchRequestBuilder {
        FetchRequestBuilder {
            method: None,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Shorthand for a bodiless GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self::builder(url).build()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers with lower-cased names, sorted by name.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Value of the first query pair named `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// URL with the query string appended, for logs and error messages.
    pub fn display_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let qs = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, sep, qs)
    }

    pub fn key(&self) -> RequestKey {
        let mut buf = Vec::new();
        push_field(&mut buf, self.method.as_str().as_bytes());
        push_field(&mut buf, self.url.as_bytes());
        buf.extend_from_slice(&(self.query.len() as u64).to_le_bytes());
        for (k, v) in &self.query {
            push_field(&mut buf, k.as_bytes());
            push_field(&mut buf, v.as_bytes());
        }
        buf.extend_from_slice(&(self.headers.len() as u64).to_le_bytes());
        for (k, v) in &self.headers {
            push_field(&mut buf, k.as_bytes());
            push_field(&mut buf, v.as_bytes());
        }
        push_field(&mut buf, &self.body.identity_bytes());

        let mut hasher = Sha256::new();
        hasher.update(&buf);

        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for b in digest.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        RequestKey(out)
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequestBuilder {
    method: Option<Method>,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: RequestBody,
}

impl FetchRequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(pairs);
        self
    }

    /// Freeze the request. Without an explicit method, a JSON body implies
    /// POST and anything else GET.
    pub fn build(self) -> FetchRequest {
        let method = self.method.unwrap_or_else(|| match self.body {
            RequestBody::Json(_) => Method::POST,
            _ => Method::GET,
        });

        let mut headers: Vec<(String, String)> = self
            .headers
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        // stable: repeated names keep their relative order
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        FetchRequest {
            method,
            url: self.url,
            headers,
            query: self.query,
            body: self.body,
        }
    }
}

/// Whatever the remote endpoint answered, success or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}
