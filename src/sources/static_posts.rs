// src/sources/static_posts.rs
//! Hand-curated posts (usually third-party coverage of a snap), keyed by
//! snap name. Never touches the network and never fails.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use tracing::{debug, warn};

use super::types::{EmptyReason, SourceOutcome};
use crate::image::{DynImageTemplate, ImageOptions};
use crate::model::NormalizedArticle;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticPost {
    pub uri: String,
    pub title: String,
    /// Raw image URL; rendered through the image template.
    #[serde(default)]
    pub image: String,
}

pub struct StaticPosts {
    posts: HashMap<String, StaticPost>,
    templater: DynImageTemplate,
    image: ImageOptions,
    badge_url: Option<String>,
}

impl StaticPosts {
    pub fn new(
        posts: HashMap<String, StaticPost>,
        templater: DynImageTemplate,
        image: ImageOptions,
    ) -> Self {
        Self {
            posts,
            templater,
            image,
            badge_url: None,
        }
    }

    /// Small publisher logo appended after the main image.
    pub fn with_badge(mut self, badge_url: Option<String>) -> Self {
        self.badge_url = badge_url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Zero or one record for `key`.
    pub fn list(&self, key: &str) -> SourceOutcome {
        let Some(post) = self.posts.get(key) else {
            debug!(key, "no static post");
            return SourceOutcome::Empty(EmptyReason::StaticKeyAbsent);
        };

        let image = match self.templater.render(&post.image, &self.image) {
            Ok(mut markup) => {
                if let Some(badge) = &self.badge_url {
                    let badge = html_escape::encode_double_quoted_attribute(badge);
                    markup.push_str(&format!(
                        r#"<img src="{badge}" class="p-blog-post__source" />"#
                    ));
                }
                Some(markup)
            }
            Err(e) => {
                warn!(key, error = %e, "static post image not rendered");
                None
            }
        };

        SourceOutcome::Fetched(vec![NormalizedArticle {
            link: post.uri.clone(),
            title: post.title.clone(),
            image,
            tags: BTreeSet::new(),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::CdnImageTemplate;
    use std::sync::Arc;

    fn posts() -> HashMap<String, StaticPost> {
        HashMap::from([(
            "offlineimap".to_string(),
            StaticPost {
                uri: "https://www.omgubuntu.co.uk/offlineimap".into(),
                title: "OfflineIMAP as a snap".into(),
                image: "https://img.test/o.png".into(),
            },
        )])
    }

    fn adapter() -> StaticPosts {
        StaticPosts::new(
            posts(),
            Arc::new(CdnImageTemplate::default()),
            ImageOptions {
                hi_def: false,
                ..ImageOptions::default()
            },
        )
    }

    #[test]
    fn known_key_yields_one_record() {
        let out = adapter()
            .with_badge(Some("https://assets.test/badge.svg".into()))
            .list("offlineimap");
        let articles = out.articles();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].link, "https://www.omgubuntu.co.uk/offlineimap");
        let image = articles[0].image.as_deref().unwrap();
        assert!(image.contains("w_346,h_231,c_fill/https://img.test/o.png"));
        assert!(image.ends_with(r#"<img src="https://assets.test/badge.svg" class="p-blog-post__source" />"#));
    }

    #[test]
    fn unknown_key_is_empty_not_failed() {
        assert_eq!(
            adapter().list("vlc"),
            SourceOutcome::Empty(EmptyReason::StaticKeyAbsent)
        );
    }

    #[test]
    fn bad_image_keeps_the_post() {
        let mut p = posts();
        p.get_mut("offlineimap").unwrap().image = String::new();
        let a = StaticPosts::new(p, Arc::new(CdnImageTemplate::default()), ImageOptions::default());
        let out = a.list("offlineimap");
        assert_eq!(out.articles().len(), 1);
        assert!(out.articles()[0].image.is_none());
    }
}
