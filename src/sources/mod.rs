// src/sources/mod.rs
//! Source adapters. Each one isolates its own failures and reports them as a
//! [`SourceOutcome`] instead of an error.

pub mod static_posts;
pub mod tagged;
pub mod types;

pub use static_posts::{StaticPost, StaticPosts};
pub use tagged::TaggedPosts;
pub use types::{EmptyReason, SourceFailure, SourceOutcome, SourceStatus};
