// src/sources/types.rs
use std::fmt;

use crate::content_api::ContentApiError;
use crate::fetch::FetchError;
use crate::model::NormalizedArticle;

/// Why a source produced nothing without anything going wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    StaticKeyAbsent,
    TagNotFound { tag: String },
    ZeroBudget,
}

/// Why a source could not be read. Never escapes the adapter as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFailure {
    Timeout,
    Transport(String),
    Cancelled,
    Status(u16),
    Decode(String),
    InvalidQueryKey(String),
}

impl From<&ContentApiError> for SourceFailure {
    fn from(e: &ContentApiError) -> Self {
        match e {
            ContentApiError::Fetch(FetchError::Timeout { .. }) => SourceFailure::Timeout,
            ContentApiError::Fetch(FetchError::Cancelled { .. }) => SourceFailure::Cancelled,
            ContentApiError::Fetch(other) => SourceFailure::Transport(other.to_string()),
            ContentApiError::Status { status, .. } => SourceFailure::Status(*status),
            ContentApiError::Decode { source, .. } => SourceFailure::Decode(source.to_string()),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFailure::Timeout => f.write_str("timeout"),
            SourceFailure::Transport(m) => write!(f, "transport: {m}"),
            SourceFailure::Cancelled => f.write_str("cancelled"),
            SourceFailure::Status(s) => write!(f, "http status {s}"),
            SourceFailure::Decode(m) => write!(f, "decode: {m}"),
            SourceFailure::InvalidQueryKey(k) => write!(f, "invalid query key {k:?}"),
        }
    }
}

/// What one adapter yielded for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Fetched(Vec<NormalizedArticle>),
    Empty(EmptyReason),
    Failed(SourceFailure),
}

/// [`SourceOutcome`] with the articles taken out, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Fetched(usize),
    Empty(EmptyReason),
    Failed(SourceFailure),
    Skipped,
}

impl SourceStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SourceStatus::Failed(_))
    }
}

impl SourceOutcome {
    pub fn articles(&self) -> &[NormalizedArticle] {
        match self {
            SourceOutcome::Fetched(v) => v,
            _ => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed(_))
    }

    pub fn into_parts(self) -> (Vec<NormalizedArticle>, SourceStatus) {
        match self {
            SourceOutcome::Fetched(v) => {
                let n = v.len();
                (v, SourceStatus::Fetched(n))
            }
            SourceOutcome::Empty(r) => (Vec::new(), SourceStatus::Empty(r)),
            SourceOutcome::Failed(f) => (Vec::new(), SourceStatus::Failed(f)),
        }
    }
}
