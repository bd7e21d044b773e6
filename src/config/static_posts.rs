// src/config/static_posts.rs
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::sources::StaticPost;

/// Load the static post mapping. Supports YAML or JSON formats.
///
/// A missing file is an error: the feed refuses to start without one. An
/// empty file is a valid, empty mapping.
pub fn load_static_posts(path: &Path) -> Result<HashMap<String, StaticPost>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading static posts from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_static_posts(&content, ext.as_str())
        .with_context(|| format!("parsing static posts from {}", path.display()))
}

pub fn parse_static_posts(s: &str, hint_ext: &str) -> Result<HashMap<String, StaticPost>> {
    if s.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let parsed = match hint_ext {
        "json" => parse_json(s),
        "yaml" | "yml" => parse_yaml(s),
        // YAML is a superset of JSON
        _ => parse_yaml(s).or_else(|_| parse_json(s)),
    }?;
    Ok(clean_map(parsed))
}

fn parse_yaml(s: &str) -> Result<HashMap<String, StaticPost>> {
    let v: Option<HashMap<String, StaticPost>> = serde_yaml::from_str(s)?;
    Ok(v.unwrap_or_default())
}

fn parse_json(s: &str) -> Result<HashMap<String, StaticPost>> {
    serde_json::from_str(s).map_err(|e| anyhow!(e))
}

fn clean_map(items: HashMap<String, StaticPost>) -> HashMap<String, StaticPost> {
    items
        .into_iter()
        .filter_map(|(k, v)| {
            let k = k.trim().to_string();
            (!k.is_empty() && !v.uri.trim().is_empty()).then_some((k, v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_and_json_both_parse() {
        let yaml = r#"
offlineimap:
  uri: https://omg.test/offlineimap
  title: OfflineIMAP
  image: https://img.test/o.png
"#;
        let json = r#"{"vlc": {"uri": "https://omg.test/vlc", "title": "VLC", "image": ""}}"#;

        let y = parse_static_posts(yaml, "yaml").unwrap();
        assert_eq!(y["offlineimap"].title, "OfflineIMAP");
        let j = parse_static_posts(json, "json").unwrap();
        assert_eq!(j["vlc"].uri, "https://omg.test/vlc");
        let sniffed = parse_static_posts(json, "").unwrap();
        assert_eq!(sniffed.len(), 1);
    }

    #[test]
    fn empty_document_is_empty_mapping() {
        assert!(parse_static_posts("  \n", "yaml").unwrap().is_empty());
        assert!(parse_static_posts("{}", "json").unwrap().is_empty());
    }

    #[test]
    fn entries_without_uri_are_dropped() {
        let yaml = "a:\n  uri: ''\n  title: x\nb:\n  uri: https://b.test\n  title: y\n";
        let m = parse_static_posts(yaml, "yml").unwrap();
        assert_eq!(m.len(), 1);
        assert!(m.contains_key("b"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_static_posts(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(err.to_string().contains("reading static posts"));
    }
}
