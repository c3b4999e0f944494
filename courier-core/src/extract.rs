//! Extraction of native builder nodes into portable element trees.
//!
//! The host supplies a [`NativeNode`] view of whatever it has: a DOM element
//! of an editable document, a rendered front-end element, or the builder's
//! in-memory model. Extraction is read-only; calling it twice on the same
//! native node yields equal trees, generated ids aside.
//!
//! When structured settings are missing or unreadable the widget's rendered
//! markup is scraped by widget family and kept as `renderedContent` for
//! manual recovery.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Value};

use crate::element::{ElementKind, ElementNode, NodeId, NodeKind, Settings, MAX_DEPTH};
use crate::error::{ExtractionError, ExtractionResult};
use crate::media::{collect_media, MediaReference};
use crate::payload::{ClipboardPayload, PayloadMetadata};

/// Structured settings attached to a native node.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsSource {
    /// JSON text, as found in a `data-settings` attribute.
    Json(String),
    /// Already structured settings (builder model).
    Structured(Settings),
}

/// Read-only view of a node in the host document or builder model.
pub trait NativeNode: Sized {
    /// Builder id of the node, if it has one.
    fn node_id(&self) -> Option<String>;

    /// Declared kind (`section`, `column`, `widget`, `container`, `page`).
    fn declared_kind(&self) -> Option<String>;

    /// Widget type for widgets. A skin suffix (`heading.default`) is allowed.
    fn widget_type(&self) -> Option<String>;

    /// Structured settings, if the node carries any.
    fn settings(&self) -> Option<SettingsSource>;

    /// Whether the node is an inner node.
    fn is_inner(&self) -> bool {
        false
    }

    /// Direct structural children in document order.
    fn children(&self) -> Vec<Self>;

    /// Rendered markup of the node, used when structured settings are
    /// unavailable.
    fn rendered_html(&self) -> Option<String> {
        None
    }
}

/// Finds native nodes by role. Backed by the host's selector logic.
pub trait Locator {
    /// Native node type produced by this locator.
    type Node: NativeNode;

    /// Locate the node for `role` (for example the element under the
    /// context-menu click), or `None`.
    fn locate(&self, role: &str) -> Option<Self::Node>;
}

/// Extraction configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Maximum tree depth; deeper subtrees are dropped with a warning.
    pub max_depth: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
        }
    }
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The extracted tree.
    pub tree: ElementNode,
    /// Media referenced anywhere in the tree.
    pub media: Vec<MediaReference>,
    /// Rendered-content scrapes keyed by node id.
    pub rendered_content: BTreeMap<String, Settings>,
    /// Non-fatal problems met on the way.
    pub warnings: Vec<String>,
}

impl Extraction {
    /// Wrap the extraction into a stamped clipboard payload.
    #[must_use]
    pub fn into_payload(self, metadata: PayloadMetadata) -> ClipboardPayload {
        ClipboardPayload::new(self.tree, self.media, metadata)
            .with_rendered_content(self.rendered_content)
    }
}

/// Converts native nodes into [`ElementNode`] trees.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    /// Create an extractor with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an extractor with custom limits.
    #[must_use]
    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Locate the node for `role` and extract it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::NotFound`] if the locator finds nothing,
    /// otherwise the errors of [`Extractor::extract`].
    pub fn extract_role<L: Locator>(&self, locator: &L, role: &str) -> ExtractionResult<Extraction> {
        let native = locator
            .locate(role)
            .ok_or_else(|| ExtractionError::NotFound(role.to_string()))?;
        self.extract(&native)
    }

    /// Extract a native node and everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidStructure`] when the root node has
    /// no recognisable kind. Problems below the root only drop the affected
    /// subtree and are reported in [`Extraction::warnings`].
    pub fn extract<N: NativeNode>(&self, native: &N) -> ExtractionResult<Extraction> {
        let mut walk = Walk {
            config: self.config,
            rendered: BTreeMap::new(),
            warnings: Vec::new(),
        };
        let tree = walk.node(native, 0)?;
        let media = collect_media(&tree);
        tracing::debug!(
            "Extracted {} ({} nodes, {} media, {} warnings)",
            tree.element_kind(),
            tree.node_count(),
            media.len(),
            walk.warnings.len()
        );
        Ok(Extraction {
            tree,
            media,
            rendered_content: walk.rendered,
            warnings: walk.warnings,
        })
    }
}

struct Walk {
    config: ExtractorConfig,
    rendered: BTreeMap<String, Settings>,
    warnings: Vec<String>,
}

impl Walk {
    fn node<N: NativeNode>(&mut self, native: &N, depth: usize) -> ExtractionResult<ElementNode> {
        if depth >= self.config.max_depth {
            return Err(ExtractionError::InvalidStructure(format!(
                "depth ceiling {} reached",
                self.config.max_depth
            )));
        }

        let declared = native
            .declared_kind()
            .ok_or_else(|| ExtractionError::InvalidStructure("missing element kind".into()))?;
        let kind = ElementKind::parse(&declared).ok_or_else(|| {
            ExtractionError::InvalidStructure(format!("unknown element kind '{declared}'"))
        })?;
        let widget_type = native.widget_type().map(|t| normalize_widget_type(&t));
        let kind = NodeKind::from_parts(kind, widget_type)
            .ok_or_else(|| ExtractionError::InvalidStructure("widget without type".into()))?;

        let id = native
            .node_id()
            .filter(|id| !id.trim().is_empty())
            .map_or_else(NodeId::generate, NodeId::new);

        let settings = self.settings(native, &id, &kind);

        let mut children = Vec::new();
        let element_kind = kind.element_kind();
        // widgets are always leaves
        if element_kind != ElementKind::Widget {
            for child in native.children() {
                let Some(child_kind) = child.declared_kind().as_deref().and_then(ElementKind::parse)
                else {
                    continue;
                };
                if !element_kind.child_kinds().contains(&child_kind) {
                    continue;
                }
                match self.node(&child, depth + 1) {
                    Ok(node) => children.push(node),
                    Err(e) => {
                        tracing::warn!("Skipping child of {id}: {e}");
                        self.warnings.push(format!("{id}: {e}"));
                    }
                }
            }
        }

        Ok(ElementNode {
            id,
            kind,
            settings,
            children,
            is_inner: native.is_inner(),
        })
    }

    fn settings<N: NativeNode>(&mut self, native: &N, id: &NodeId, kind: &NodeKind) -> Settings {
        let parsed = match native.settings() {
            Some(SettingsSource::Structured(map)) => Ok(map),
            Some(SettingsSource::Json(text)) => parse_settings(&text),
            None => Err("no structured settings".to_string()),
        };

        match (parsed, kind) {
            (Ok(map), _) => map,
            (Err(reason), NodeKind::Widget { widget_type }) => {
                tracing::debug!("Falling back to rendered content for {id} ({reason})");
                self.warnings
                    .push(format!("{id}: {reason}, using rendered content"));
                let scraped = native
                    .rendered_html()
                    .map(|html| scrape_rendered(widget_type, &html))
                    .unwrap_or_default();
                if !scraped.is_empty() {
                    self.rendered.insert(id.to_string(), scraped.clone());
                }
                scraped
            }
            (Err(reason), _) => {
                if native.settings().is_some() {
                    tracing::warn!("Ignoring unreadable settings of {id}: {reason}");
                    self.warnings.push(format!("{id}: {reason}"));
                }
                Settings::new()
            }
        }
    }
}

fn parse_settings(text: &str) -> Result<Settings, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Settings::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Array(items)) if items.is_empty() => Ok(Settings::new()),
        Ok(_) => Err("settings blob is not an object".to_string()),
        Err(e) => Err(format!("settings blob is not valid JSON: {e}")),
    }
}

/// Strip a skin suffix: `heading.default` becomes `heading`.
fn normalize_widget_type(raw: &str) -> String {
    raw.trim()
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Widget families with their own scraping heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WidgetFamily {
    Image,
    Heading,
    Text,
    Button,
    Other,
}

impl WidgetFamily {
    fn of(widget_type: &str) -> Self {
        let t = widget_type.to_ascii_lowercase();
        if t.contains("image") || t == "logo" {
            Self::Image
        } else if t.contains("heading") || t.contains("title") {
            Self::Heading
        } else if t.contains("text") || t == "paragraph" {
            Self::Text
        } else if t.contains("button") {
            Self::Button
        } else {
            Self::Other
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid scrape pattern"))
}

fn img_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<img\b[^>]*>")
}

fn attr_value(tag: &str, name: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = regex(&RE, r#"(?is)\s([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#);
    re.captures_iter(tag).find_map(|cap| {
        let attr = cap.get(1)?.as_str();
        if attr.eq_ignore_ascii_case(name) {
            cap.get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| m.as_str().to_string())
        } else {
            None
        }
    })
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<(h[1-6])\b[^>]*>(.*?)</h[1-6]\s*>")
}

fn anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<a\b([^>]*)>(.*?)</a\s*>")
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<[^>]*>")
}

/// Visible text of a markup fragment with whitespace collapsed.
fn text_of(html: &str) -> String {
    let stripped = tag_regex().replace_all(html, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scrape rendered markup into settings for the widget's family.
fn scrape_rendered(widget_type: &str, html: &str) -> Settings {
    let mut out = Settings::new();
    match WidgetFamily::of(widget_type) {
        WidgetFamily::Image => {
            if let Some(tag) = img_regex().find(html) {
                let src = attr_value(tag.as_str(), "src").unwrap_or_default();
                let alt = attr_value(tag.as_str(), "alt").unwrap_or_default();
                if !src.is_empty() {
                    out.insert("image".into(), json!({"url": src, "alt": alt}));
                }
            }
        }
        WidgetFamily::Heading => {
            if let Some(cap) = heading_regex().captures(html) {
                let level = cap.get(1).map_or("h2", |m| m.as_str()).to_ascii_lowercase();
                let text = cap.get(2).map(|m| text_of(m.as_str())).unwrap_or_default();
                out.insert("title".into(), Value::String(text));
                out.insert("header_size".into(), Value::String(level));
            } else {
                let text = text_of(html);
                if !text.is_empty() {
                    out.insert("title".into(), Value::String(text));
                }
            }
        }
        WidgetFamily::Text => {
            let inner = html.trim();
            if !inner.is_empty() {
                out.insert("editor".into(), Value::String(inner.to_string()));
            }
        }
        WidgetFamily::Button => {
            if let Some(cap) = anchor_regex().captures(html) {
                let attrs = cap.get(1).map_or("", |m| m.as_str());
                let href = attr_value(&format!(" {attrs}"), "href").unwrap_or_default();
                let label = cap.get(2).map(|m| text_of(m.as_str())).unwrap_or_default();
                out.insert("text".into(), Value::String(label));
                out.insert("link".into(), json!({"url": href}));
            } else {
                let text = text_of(html);
                if !text.is_empty() {
                    out.insert("text".into(), Value::String(text));
                }
            }
        }
        WidgetFamily::Other => {
            let inner = html.trim();
            if !inner.is_empty() {
                out.insert("html".into(), Value::String(inner.to_string()));
            }
        }
    }
    out
}

/// The builder's in-memory model, as exported by its editor (`toJSON()`),
/// is itself a native node.
impl NativeNode for Value {
    fn node_id(&self) -> Option<String> {
        match self.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn declared_kind(&self) -> Option<String> {
        self.get("elType")?.as_str().map(str::to_string)
    }

    fn widget_type(&self) -> Option<String> {
        self.get("widgetType")?.as_str().map(str::to_string)
    }

    fn settings(&self) -> Option<SettingsSource> {
        match self.get("settings")? {
            Value::Object(map) => Some(SettingsSource::Structured(map.clone())),
            Value::String(text) => Some(SettingsSource::Json(text.clone())),
            Value::Array(items) if items.is_empty() => {
                Some(SettingsSource::Structured(Settings::new()))
            }
            other => Some(SettingsSource::Json(other.to_string())),
        }
    }

    fn is_inner(&self) -> bool {
        self.get("isInner").and_then(Value::as_bool).unwrap_or(false)
    }

    fn children(&self) -> Vec<Self> {
        self.get("elements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn rendered_html(&self) -> Option<String> {
        self.get("renderedHtml")?.as_str().map(str::to_string)
    }
}
