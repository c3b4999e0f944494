//! Tree sanitization.
//!
//! Every tree read from a clipboard is untrusted. [`Sanitizer::sanitize`]
//! produces a tree that is safe to hand to the target builder:
//!
//! ```text
//! ┌────────────┐   ids, kinds, limits   ┌──────────┐   per value   ┌──────────┐
//! │ input tree │ ─────────────────────▶ │  nodes   │ ────────────▶ │ settings │
//! └────────────┘                        └──────────┘               └──────────┘
//!                                                      url keys ──▶ url::is_safe_url
//!                                                      css keys ──▶ css::sanitize_css
//!                                                      markup   ──▶ markup::sanitize_markup
//!                                                      known    ──▶ coerce::coerce
//! ```
//!
//! Sanitization never fails. Invalid nodes are replaced by a stub with the
//! same id and kind, nodes past the depth or count ceiling are dropped, and
//! the output is stable: sanitizing it again returns it unchanged.

pub mod coerce;
pub mod css;
pub mod markup;
pub mod url;

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::element::{ElementNode, NodeId, NodeKind, Settings, MAX_DEPTH};
use crate::limits::{
    truncate_text, validate_node_id, validate_setting_key, validate_widget_type,
    MAX_NODES_PER_TREE, MAX_TEXT_LEN,
};
use crate::media::MediaReference;
use crate::payload::ClipboardPayload;

pub use coerce::{coerce, expected_type, Expected};
pub use css::sanitize_css;
pub use markup::{sanitize_markup, MarkupStats};
pub use url::{is_safe_url, is_script_url, is_url_key, ALLOWED_SCHEMES};

/// Widget type given to widgets whose declared type was unusable.
pub const UNKNOWN_WIDGET: &str = "unknown";

const MAX_SETTLE_ROUNDS: usize = 4;

/// Sanitizer limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizerConfig {
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Maximum number of nodes kept.
    pub max_nodes: usize,
    /// Maximum byte length of a string setting.
    pub max_text_len: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_nodes: MAX_NODES_PER_TREE,
            max_text_len: MAX_TEXT_LEN,
        }
    }
}

/// What a sanitization run changed. Non-fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeReport {
    /// Nodes replaced by a stub.
    pub degraded_nodes: usize,
    /// Nodes dropped past the depth or count ceiling.
    pub dropped_nodes: usize,
    /// Ids that were invalid or duplicated and got regenerated.
    pub regenerated_ids: usize,
    /// Settings dropped (bad key, uncoercible value).
    pub dropped_settings: usize,
    /// Settings whose type was coerced.
    pub coerced_settings: usize,
    /// Markup values that had tags, attributes or comments removed.
    pub stripped_markup: usize,
    /// URL values rejected by the scheme check.
    pub rejected_urls: usize,
    /// CSS values that had constructs removed.
    pub stripped_css: usize,
    /// Strings cut to the length ceiling.
    pub truncated: usize,
}

impl SanitizeReport {
    /// Whether the input was already clean.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// A sanitized tree plus what was changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    /// Safe tree.
    pub tree: ElementNode,
    /// Changes made.
    pub report: SanitizeReport,
}

/// Produces safe trees from untrusted ones.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    config: SanitizerConfig,
}

impl Sanitizer {
    /// Sanitizer with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitizer with custom limits.
    #[must_use]
    pub fn with_config(config: SanitizerConfig) -> Self {
        Self { config }
    }

    /// Sanitize a tree.
    #[must_use]
    pub fn sanitize(&self, tree: &ElementNode) -> ElementNode {
        self.sanitize_with_report(tree).tree
    }

    /// Sanitize a tree and report what changed.
    #[must_use]
    pub fn sanitize_with_report(&self, tree: &ElementNode) -> Sanitized {
        let mut run = Run {
            config: self.config,
            seen: HashSet::new(),
            kept: 0,
            report: SanitizeReport::default(),
        };
        // the root always survives
        let tree = run.node(tree, 0).unwrap_or_else(|| {
            ElementNode::stub(NodeId::generate(), tree.kind.clone())
        });
        if !run.report.is_clean() {
            tracing::debug!("Sanitized tree: {:?}", run.report);
        }
        Sanitized {
            tree,
            report: run.report,
        }
    }

    /// Drop media references whose URL fails the scheme check.
    #[must_use]
    pub fn sanitize_media(&self, media: &[MediaReference]) -> Vec<MediaReference> {
        media
            .iter()
            .filter(|m| {
                let safe = is_safe_url(&m.url);
                if !safe {
                    tracing::warn!("Dropping media {} with unsafe URL", m.id);
                }
                safe
            })
            .map(|m| {
                let mut m = m.clone();
                m.id = sanitize_markup(&m.id).0;
                m.alt = sanitize_markup(&m.alt).0;
                m
            })
            .collect()
    }

    /// Sanitize everything in a payload that ends up on the target: the
    /// tree, the media list and the rendered-content scrapes.
    #[must_use]
    pub fn sanitize_payload(&self, payload: &ClipboardPayload) -> (ClipboardPayload, SanitizeReport) {
        let Sanitized { tree, mut report } = self.sanitize_with_report(&payload.data);
        let media = self.sanitize_media(&payload.media);

        let mut run = Run {
            config: self.config,
            seen: HashSet::new(),
            kept: 0,
            report: SanitizeReport::default(),
        };
        let rendered_content: BTreeMap<String, Settings> = payload
            .rendered_content
            .iter()
            .map(|(id, settings)| (id.clone(), run.settings(settings)))
            .collect();
        report.stripped_markup += run.report.stripped_markup;
        report.rejected_urls += run.report.rejected_urls;

        let mut out = payload.clone();
        out.element_kind = tree.element_kind();
        out.data = tree;
        out.media = media;
        out.rendered_content = rendered_content;
        (out, report)
    }
}

struct Run {
    config: SanitizerConfig,
    seen: HashSet<String>,
    kept: usize,
    report: SanitizeReport,
}

impl Run {
    fn node(&mut self, node: &ElementNode, depth: usize) -> Option<ElementNode> {
        if self.kept >= self.config.max_nodes {
            let dropped = node.node_count();
            tracing::warn!("Dropping {dropped} nodes past the {} node ceiling", self.config.max_nodes);
            self.report.dropped_nodes += dropped;
            return None;
        }
        self.kept += 1;

        let id = self.unique_id(&node.id);

        let kind = match &node.kind {
            NodeKind::Widget { widget_type } if validate_widget_type(widget_type).is_err() => {
                tracing::warn!("Replacing widget {id} with invalid type by a stub");
                self.report.degraded_nodes += 1;
                let dropped = node.node_count() - 1;
                self.report.dropped_nodes += dropped;
                return Some(ElementNode::stub(id, NodeKind::widget(UNKNOWN_WIDGET)));
            }
            kind => kind.clone(),
        };

        let settings = self.settings(&node.settings);

        let mut children = Vec::new();
        if depth + 1 >= self.config.max_depth {
            if !node.children.is_empty() {
                let dropped: usize = node.children.iter().map(ElementNode::node_count).sum();
                tracing::warn!("Dropping {dropped} nodes below {id}: depth ceiling reached");
                self.report.dropped_nodes += dropped;
            }
        } else {
            // widgets never have children
            if matches!(kind, NodeKind::Widget { .. }) && !node.children.is_empty() {
                let dropped: usize = node.children.iter().map(ElementNode::node_count).sum();
                self.report.dropped_nodes += dropped;
            } else {
                children = node
                    .children
                    .iter()
                    .filter_map(|child| self.node(child, depth + 1))
                    .collect();
            }
        }

        Some(ElementNode {
            id,
            kind,
            settings,
            children,
            is_inner: node.is_inner,
        })
    }

    fn unique_id(&mut self, id: &NodeId) -> NodeId {
        if validate_node_id(id.as_str()).is_ok() && self.seen.insert(id.as_str().to_string()) {
            return id.clone();
        }
        self.report.regenerated_ids += 1;
        loop {
            let fresh = NodeId::generate();
            if self.seen.insert(fresh.as_str().to_string()) {
                return fresh;
            }
        }
    }

    fn settings(&mut self, settings: &Settings) -> Settings {
        let mut out = Settings::new();
        for (key, value) in settings {
            if validate_setting_key(key).is_err() {
                tracing::warn!("Dropping setting with invalid key {key:?}");
                self.report.dropped_settings += 1;
                continue;
            }
            let value = self.value(key, value, 0);
            let value = match expected_type(key) {
                None => value,
                Some(expected) => match coerce(&value, expected) {
                    Some(coerced) => {
                        if coerced != value {
                            self.report.coerced_settings += 1;
                        }
                        coerced
                    }
                    None => {
                        tracing::warn!("Dropping setting {key}: cannot coerce to {expected:?}");
                        self.report.dropped_settings += 1;
                        continue;
                    }
                },
            };
            out.insert(key.clone(), value);
        }
        out
    }

    fn value(&mut self, key: &str, value: &Value, depth: usize) -> Value {
        match value {
            Value::String(s) => Value::String(self.string(key, s)),
            Value::Array(items) if depth < self.config.max_depth => Value::Array(
                items
                    .iter()
                    .map(|item| self.value(key, item, depth + 1))
                    .collect(),
            ),
            Value::Object(map) if depth < self.config.max_depth => {
                let mut out = Settings::new();
                for (k, v) in map {
                    if validate_setting_key(k).is_err() {
                        self.report.dropped_settings += 1;
                        continue;
                    }
                    out.insert(k.clone(), self.value(k, v, depth + 1));
                }
                Value::Object(out)
            }
            Value::Array(_) | Value::Object(_) => {
                self.report.dropped_settings += 1;
                Value::Null
            }
            other => other.clone(),
        }
    }

    /// Clean one string; repeats until the value is stable and within the
    /// length ceiling.
    fn string(&mut self, key: &str, raw: &str) -> String {
        let mut current = raw.to_string();
        for _ in 0..MAX_SETTLE_ROUNDS {
            let cut = truncate_text(&current, self.config.max_text_len);
            if cut.len() < current.len() {
                self.report.truncated += 1;
            }
            let next = self.clean_string(key, cut);
            if next == current {
                return current;
            }
            current = next;
        }
        // markup that keeps growing past the ceiling is reduced to text
        self.report.stripped_markup += 1;
        let text: String = current.chars().filter(|c| !matches!(c, '<' | '>')).collect();
        truncate_text(&text, self.config.max_text_len).to_string()
    }

    fn clean_string(&mut self, key: &str, s: &str) -> String {
        if is_url_key(key) {
            if is_safe_url(s) {
                return s.to_string();
            }
            tracing::warn!("Rejected unsafe URL under {key}");
            self.report.rejected_urls += 1;
            return String::new();
        }
        let mut cleaned = if css::is_css_key(key) {
            let css = sanitize_css(s);
            if css != s {
                self.report.stripped_css += 1;
            }
            css
        } else {
            let (markup, stats) = sanitize_markup(s);
            if !stats.is_clean() {
                self.report.stripped_markup += 1;
                self.report.rejected_urls += stats.rejected_urls;
            }
            markup
        };
        if is_script_url(&cleaned) {
            self.report.rejected_urls += 1;
            cleaned.clear();
        }
        cleaned
    }
}
