// src/model.rs
//! Records shared between the content API client, the adapters and the feed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque tag identifier issued by the content API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TagId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(TagId)
    }
}

/// One feed entry as handed to callers.
///
/// `link` goes out on the wire as `slug`, which is what the snap page
/// front-end reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedArticle {
    #[serde(rename = "slug")]
    pub link: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip)]
    pub tags: BTreeSet<TagId>,
}

impl NormalizedArticle {
    pub fn has_tag(&self, tag: TagId) -> bool {
        self.tags.contains(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_front_end_keys() {
        let a = NormalizedArticle {
            link: "/blog/hello".into(),
            title: "Hello".into(),
            image: None,
            tags: BTreeSet::from([TagId(1)]),
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v, serde_json::json!({"slug": "/blog/hello", "title": "Hello"}));
    }

    #[test]
    fn tag_id_parses_trimmed_numbers_only() {
        assert_eq!(" 2996 ".parse::<TagId>().unwrap(), TagId(2996));
        assert!("snapcraft".parse::<TagId>().is_err());
    }
}
