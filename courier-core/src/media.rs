//! Media references collected alongside a tree.
//!
//! A node may point at media from several nested settings paths
//! (`image.url`, `background_image.url`, inline CSS), so references are
//! gathered into a flat side-list instead of being embedded in the tree.
//! Media are never transferred here; URLs are only listed, flagged and
//! rewritten.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::element::{ElementNode, MAX_DEPTH};

/// Kind of media a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    /// Image attachment.
    Image,
    /// Video file or embed link.
    Video,
    /// Audio file.
    Audio,
    /// Background image setting.
    BackgroundImage,
    /// `url(...)` inside inline CSS.
    CssBackground,
    /// Plain hyperlink.
    Link,
}

/// A media URL referenced by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Attachment id when known, otherwise `<node id>:<settings path>`.
    pub id: String,
    /// Absolute or relative URL as found.
    pub url: String,
    /// Media kind.
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Alternative text.
    #[serde(default)]
    pub alt: String,
    /// Width in pixels, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Height in pixels, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

fn css_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("valid css url pattern")
    })
}

/// Collect every media reference in a tree, in tree order, without
/// duplicates (same URL and type).
#[must_use]
pub fn collect_media(tree: &ElementNode) -> Vec<MediaReference> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for node in tree.iter() {
        for (key, value) in &node.settings {
            let mut collector = Collector {
                node_id: node.id.as_str(),
                out: &mut out,
                seen: &mut seen,
            };
            collector.visit(key, key, value, 0);
        }
    }
    out
}

struct Collector<'a> {
    node_id: &'a str,
    out: &'a mut Vec<MediaReference>,
    seen: &'a mut HashSet<(String, MediaType)>,
}

impl Collector<'_> {
    fn visit(&mut self, key: &str, path: &str, value: &Value, depth: usize) {
        if depth >= MAX_DEPTH {
            return;
        }
        match value {
            Value::Object(map) => {
                if let Some(url) = map.get("url").and_then(Value::as_str) {
                    if let Some(media_type) = classify_object_key(key, url) {
                        let id = match map.get("id") {
                            Some(Value::Number(n)) => n.to_string(),
                            Some(Value::String(s)) if !s.is_empty() => s.clone(),
                            _ => format!("{}:{path}", self.node_id),
                        };
                        let alt = map
                            .get("alt")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let width = map.get("width").and_then(as_dimension);
                        let height = map.get("height").and_then(as_dimension);
                        self.push(MediaReference {
                            id,
                            url: url.to_string(),
                            media_type,
                            alt,
                            width,
                            height,
                        });
                    }
                }
                for (k, v) in map {
                    if k != "url" {
                        self.visit(k, &format!("{path}.{k}"), v, depth + 1);
                    }
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    // array items inherit the parent key (galleries, slides)
                    self.visit(key, &format!("{path}[{i}]"), item, depth + 1);
                }
            }
            Value::String(s) => {
                if let Some(media_type) = classify_string_key(key) {
                    if !s.trim().is_empty() {
                        self.push(self.reference(path, s, media_type));
                    }
                }
                if s.to_ascii_lowercase().contains("url(") {
                    for cap in css_url_regex().captures_iter(s) {
                        if let Some(m) = cap.get(1) {
                            self.push(self.reference(path, m.as_str(), MediaType::CssBackground));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn reference(&self, path: &str, url: &str, media_type: MediaType) -> MediaReference {
        MediaReference {
            id: format!("{}:{path}", self.node_id),
            url: url.to_string(),
            media_type,
            alt: String::new(),
            width: None,
            height: None,
        }
    }

    fn push(&mut self, reference: MediaReference) {
        if reference.url.trim().is_empty() {
            return;
        }
        if self
            .seen
            .insert((reference.url.clone(), reference.media_type))
        {
            self.out.push(reference);
        }
    }
}

fn as_dimension(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn classify_object_key(key: &str, url: &str) -> Option<MediaType> {
    let key = key.to_ascii_lowercase();
    if key.contains("background") && key.contains("image") {
        Some(MediaType::BackgroundImage)
    } else if key.contains("video") {
        Some(MediaType::Video)
    } else if key.contains("audio") {
        Some(MediaType::Audio)
    } else if key.contains("image") || key.contains("gallery") || key.contains("slides") {
        Some(MediaType::Image)
    } else if key == "link" || key.ends_with("_link") || key.contains("url") {
        Some(MediaType::Link)
    } else if has_image_extension(url) {
        Some(MediaType::Image)
    } else {
        None
    }
}

fn classify_string_key(key: &str) -> Option<MediaType> {
    let key = key.to_ascii_lowercase();
    if key.contains("video") && (key.ends_with("_link") || key.ends_with("_url")) {
        Some(MediaType::Video)
    } else if key.contains("audio") && (key.ends_with("_link") || key.ends_with("_url")) {
        Some(MediaType::Audio)
    } else {
        None
    }
}

fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let lower = path.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".avif"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// References whose host differs from `target_origin`.
///
/// Relative URLs resolve against the source site, so they are flagged too.
#[must_use]
pub fn foreign_media<'a>(
    media: &'a [MediaReference],
    target_origin: &str,
) -> Vec<&'a MediaReference> {
    let target_host = Url::parse(target_origin)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
    media
        .iter()
        .filter(|m| m.media_type != MediaType::Link)
        .filter(|m| {
            let host = Url::parse(&m.url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
            match (&host, &target_host) {
                (Some(h), Some(t)) => h != t,
                _ => true,
            }
        })
        .collect()
}

/// Return a copy of `tree` with media URLs replaced according to `map`.
///
/// Exact string matches are replaced, and occurrences inside longer strings
/// (inline CSS, markup) are replaced too. The second element is the number
/// of replacements made.
#[must_use]
pub fn rewrite_media_urls(
    tree: &ElementNode,
    map: &HashMap<String, String>,
) -> (ElementNode, usize) {
    let mut out = tree.clone();
    let mut count = 0;
    if !map.is_empty() {
        rewrite_node(&mut out, map, &mut count, 0);
    }
    (out, count)
}

fn rewrite_node(
    node: &mut ElementNode,
    map: &HashMap<String, String>,
    count: &mut usize,
    depth: usize,
) {
    if depth >= MAX_DEPTH {
        return;
    }
    for value in node.settings.values_mut() {
        rewrite_value(value, map, count, depth);
    }
    for child in &mut node.children {
        rewrite_node(child, map, count, depth + 1);
    }
}

fn rewrite_value(value: &mut Value, map: &HashMap<String, String>, count: &mut usize, depth: usize) {
    if depth >= MAX_DEPTH {
        return;
    }
    match value {
        Value::String(s) => {
            if let Some(new) = map.get(s.as_str()) {
                *s = new.clone();
                *count += 1;
                return;
            }
            for (old, new) in map {
                if !old.is_empty() && s.contains(old.as_str()) {
                    *count += s.matches(old.as_str()).count();
                    *s = s.replace(old.as_str(), new);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_value(item, map, count, depth + 1);
            }
        }
        Value::Object(obj) => {
            for v in obj.values_mut() {
                rewrite_value(v, map, count, depth + 1);
            }
        }
        _ => {}
    }
}
