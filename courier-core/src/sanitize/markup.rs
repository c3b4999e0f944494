//! Markup cleaning for text and HTML settings.
//!
//! A single forward scan over the bytes of the fragment rebuilds every tag
//! it accepts from scratch (name plus filtered attributes), so nothing the
//! scanner did not understand survives as markup. Anything that looks like
//! the start of a tag but cannot be parsed is escaped. The scan is repeated
//! until its output stops changing.

use super::css::sanitize_css;
use super::url::{is_safe_url, URL_ATTRIBUTES};

const MAX_PASSES: usize = 16;

/// Elements dropped together with their content.
const DROP_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "applet", "noscript", "noembed", "noframes",
    "template", "xmp", "frameset",
];

/// Elements dropped on their own; their content (if any) is kept as text.
const DROP_TAG: &[&str] = &["embed", "meta", "link", "base", "frame", "param", "svg", "math"];

/// Counters for one cleaning run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkupStats {
    /// Tags or elements removed.
    pub removed_tags: usize,
    /// Attributes removed (event handlers, invalid names).
    pub removed_attributes: usize,
    /// URL attributes rejected by the scheme check.
    pub rejected_urls: usize,
    /// HTML comments removed.
    pub removed_comments: usize,
}

impl MarkupStats {
    /// Whether anything was removed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Clean a markup fragment until it is stable.
#[must_use]
pub fn sanitize_markup(html: &str) -> (String, MarkupStats) {
    let mut stats = MarkupStats::default();
    if !html.contains('<') {
        return (html.to_string(), stats);
    }
    let mut current = html.to_string();
    for _ in 0..MAX_PASSES {
        let next = clean_once(&current, &mut stats);
        if next == current {
            return (current, stats);
        }
        current = next;
    }
    tracing::warn!("Markup did not settle after {MAX_PASSES} passes, escaping it");
    stats.removed_tags += 1;
    (current.replace('<', "&lt;"), stats)
}

fn find_ci(haystack: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    if start > haystack.len() || needle.len() > haystack.len() - start {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|p| start + p)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_')
}

fn is_valid_attr_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_' || b == b':')
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
}

/// A parsed tag.
struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    attributes: Vec<(String, Option<String>)>,
    /// Byte index just after `>`.
    end: usize,
}

/// Parse a tag starting at `start` (which holds `<`). `None` if the bytes do
/// not form a complete tag.
fn parse_tag(html: &str, start: usize) -> Option<Tag> {
    let bytes = html.as_bytes();
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    if !bytes.get(i).copied().is_some_and(is_name_start) {
        return None;
    }
    let name_start = i;
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = html[name_start..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut self_closing = false;
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => {
                return Some(Tag {
                    name,
                    closing,
                    self_closing,
                    attributes,
                    end: i + 1,
                })
            }
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }
        self_closing = false;

        let attr_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'/' | b'>' | b'=')
        {
            i += 1;
        }
        if i == attr_start {
            // a stray '=' with no name
            i += 1;
            continue;
        }
        let attr_name = html[attr_start..i].to_ascii_lowercase();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            attributes.push((attr_name, None));
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = match bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                let close = html[i + 1..].find(*quote as char)? + i + 1;
                let value = html[i + 1..close].to_string();
                i = close + 1;
                value
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                html[value_start..i].to_string()
            }
        };
        attributes.push((attr_name, Some(value)));
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_tag(tag: &Tag, stats: &mut MarkupStats) -> String {
    let mut out = String::with_capacity(16);
    out.push('<');
    if tag.closing {
        out.push('/');
    }
    out.push_str(&tag.name);
    if !tag.closing {
        for (name, value) in &tag.attributes {
            if !is_valid_attr_name(name) || name.starts_with("on") || name == "srcdoc" {
                stats.removed_attributes += 1;
                continue;
            }
            let Some(value) = value else {
                out.push(' ');
                out.push_str(name);
                continue;
            };
            let value = if URL_ATTRIBUTES.contains(&name.as_str()) {
                if !is_safe_url(value) {
                    stats.rejected_urls += 1;
                    continue;
                }
                value.clone()
            } else if name == "style" {
                let css = sanitize_css(value);
                if css.trim().is_empty() {
                    stats.removed_attributes += 1;
                    continue;
                }
                css
            } else {
                value.clone()
            };
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(&value));
            out.push('"');
        }
        if tag.self_closing {
            out.push_str(" /");
        }
    }
    out.push('>');
    out
}

fn clean_once(html: &str, stats: &mut MarkupStats) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut i = 0;
    let mut text_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        out.push_str(&html[text_start..i]);

        // comments, doctypes, processing instructions
        if html[i..].starts_with("<!--") {
            stats.removed_comments += 1;
            i = find_ci(bytes, i + 4, b"-->").map_or(bytes.len(), |p| p + 3);
            text_start = i;
            continue;
        }
        if matches!(bytes.get(i + 1), Some(b'!' | b'?')) {
            stats.removed_tags += 1;
            i = find_ci(bytes, i + 2, b">").map_or(bytes.len(), |p| p + 1);
            text_start = i;
            continue;
        }

        let Some(tag) = parse_tag(html, i) else {
            out.push_str("&lt;");
            i += 1;
            text_start = i;
            continue;
        };

        if DROP_WITH_CONTENT.contains(&tag.name.as_str()) {
            stats.removed_tags += 1;
            i = if tag.closing || tag.self_closing {
                tag.end
            } else {
                let closer = format!("</{}", tag.name);
                find_ci(bytes, tag.end, closer.as_bytes())
                    .map_or(bytes.len(), |p| {
                        find_ci(bytes, p, b">").map_or(bytes.len(), |q| q + 1)
                    })
            };
        } else if DROP_TAG.contains(&tag.name.as_str()) {
            stats.removed_tags += 1;
            i = tag.end;
        } else {
            out.push_str(&render_tag(&tag, stats));
            i = tag.end;
        }
        text_start = i;
    }
    out.push_str(&html[text_start..]);
    out
}
