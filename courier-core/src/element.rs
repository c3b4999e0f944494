//! Element nodes - the portable unit shared by every pipeline stage.
//!
//! The JSON shape follows the builder's own document format (`elType`,
//! `widgetType`, `settings`, `elements`, `isInner`) so a payload can be
//! handed to the target runtime without another translation step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Ordered settings map. Values are plain JSON, so functions or external
/// references cannot be represented.
pub type Settings = Map<String, Value>;

/// Hard ceiling for every recursive traversal of a tree.
pub const MAX_DEPTH: usize = 50;

/// Length of generated node ids (hex characters).
const GENERATED_ID_LEN: usize = 8;

/// Identifier of a node, unique within its tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier in the builder's short hex style.
    #[must_use]
    pub fn generate() -> Self {
        let mut hex = Uuid::new_v4().simple().to_string();
        hex.truncate(GENERATED_ID_LEN);
        Self(hex)
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural role of a node, without widget detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Leaf content block.
    Widget,
    /// Row holding columns.
    Section,
    /// Column holding widgets or inner sections.
    Column,
    /// Flexbox container holding containers or widgets.
    Container,
    /// Whole document.
    Page,
}

impl ElementKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Widget => "widget",
            Self::Section => "section",
            Self::Column => "column",
            Self::Container => "container",
            Self::Page => "page",
        }
    }

    /// Parse a declared kind, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "widget" => Some(Self::Widget),
            "section" => Some(Self::Section),
            "column" => Some(Self::Column),
            "container" => Some(Self::Container),
            "page" | "document" => Some(Self::Page),
            _ => None,
        }
    }

    /// Kinds that may appear as direct children of this kind.
    #[must_use]
    pub const fn child_kinds(self) -> &'static [ElementKind] {
        match self {
            Self::Widget => &[],
            Self::Section => &[Self::Column],
            // inner sections live inside columns
            Self::Column => &[Self::Widget, Self::Section],
            Self::Container => &[Self::Container, Self::Widget],
            Self::Page => &[Self::Section, Self::Container],
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged node kind. Widgets also carry their widget type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "elType", rename_all = "lowercase")]
pub enum NodeKind {
    /// A widget leaf.
    Widget {
        /// Builder widget type, e.g. `heading`.
        #[serde(rename = "widgetType")]
        widget_type: String,
    },
    /// A section.
    Section,
    /// A column.
    Column,
    /// A container.
    Container,
    /// A page.
    Page,
}

impl NodeKind {
    /// Build a widget kind.
    #[must_use]
    pub fn widget(widget_type: impl Into<String>) -> Self {
        Self::Widget {
            widget_type: widget_type.into(),
        }
    }

    /// Combine a structural kind with an optional widget type.
    ///
    /// Returns `None` for a widget without a type.
    #[must_use]
    pub fn from_parts(kind: ElementKind, widget_type: Option<String>) -> Option<Self> {
        match kind {
            ElementKind::Widget => widget_type
                .filter(|t| !t.trim().is_empty())
                .map(|t| Self::Widget { widget_type: t }),
            ElementKind::Section => Some(Self::Section),
            ElementKind::Column => Some(Self::Column),
            ElementKind::Container => Some(Self::Container),
            ElementKind::Page => Some(Self::Page),
        }
    }

    /// Structural kind without widget detail.
    #[must_use]
    pub const fn element_kind(&self) -> ElementKind {
        match self {
            Self::Widget { .. } => ElementKind::Widget,
            Self::Section => ElementKind::Section,
            Self::Column => ElementKind::Column,
            Self::Container => ElementKind::Container,
            Self::Page => ElementKind::Page,
        }
    }

    /// Widget type, if this is a widget.
    #[must_use]
    pub fn widget_type(&self) -> Option<&str> {
        match self {
            Self::Widget { widget_type } => Some(widget_type),
            _ => None,
        }
    }
}

/// A portable builder node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    /// Unique identifier within the tree.
    #[serde(default)]
    pub id: NodeId,
    /// Node kind (and widget type).
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Builder settings.
    #[serde(default)]
    pub settings: Settings,
    /// Children in render order.
    #[serde(default, rename = "elements", alias = "children")]
    pub children: Vec<ElementNode>,
    /// Whether the node is a structural child of a widget-level placement
    /// (for example an inner section). Placement hint only.
    #[serde(default)]
    pub is_inner: bool,
}

impl ElementNode {
    /// Create a node of the given kind with a generated id.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::generate(),
            kind,
            settings: Settings::new(),
            children: Vec::new(),
            is_inner: false,
        }
    }

    /// Create a widget node.
    #[must_use]
    pub fn widget(widget_type: impl Into<String>) -> Self {
        Self::new(NodeKind::widget(widget_type))
    }

    /// Create a section node.
    #[must_use]
    pub fn section() -> Self {
        Self::new(NodeKind::Section)
    }

    /// Create a column node.
    #[must_use]
    pub fn column() -> Self {
        Self::new(NodeKind::Column)
    }

    /// Create a container node.
    #[must_use]
    pub fn container() -> Self {
        Self::new(NodeKind::Container)
    }

    /// Create a page node.
    #[must_use]
    pub fn page() -> Self {
        Self::new(NodeKind::Page)
    }

    /// Minimal safe node: same id and kind, no settings, no children.
    #[must_use]
    pub fn stub(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            settings: Settings::new(),
            children: Vec::new(),
            is_inner: false,
        }
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = NodeId::new(id);
        self
    }

    /// Set one setting.
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Replace all settings.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Append a child.
    #[must_use]
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Mark the node as inner.
    #[must_use]
    pub fn with_inner(mut self, is_inner: bool) -> Self {
        self.is_inner = is_inner;
        self
    }

    /// Structural kind.
    #[must_use]
    pub const fn element_kind(&self) -> ElementKind {
        self.kind.element_kind()
    }

    /// Widget type, if this is a widget.
    #[must_use]
    pub fn widget_type(&self) -> Option<&str> {
        self.kind.widget_type()
    }

    /// Pre-order iterator over this node and all descendants.
    ///
    /// Uses an explicit stack, so arbitrarily deep trees cannot exhaust the
    /// call stack.
    pub fn iter(&self) -> impl Iterator<Item = &ElementNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Number of nodes in the tree, including this one.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Depth of the tree (a leaf has depth 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1_usize)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            stack.extend(node.children.iter().map(|c| (c, depth + 1)));
        }
        max
    }

    /// Find a node by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&ElementNode> {
        self.iter().find(|n| n.id.as_str() == id)
    }

    /// Lift an arbitrary JSON value into a node, degrading what cannot be
    /// understood instead of failing.
    ///
    /// Returns `None` when the root itself is not a recognisable element.
    /// Well-formed input lifts exactly.
    #[must_use]
    pub fn from_value_lossy(value: &Value) -> Option<LiftedNode> {
        let mut degraded = 0;
        let node = lift_node(value, 0, &mut degraded)?;
        Some(LiftedNode { node, degraded })
    }
}

/// Result of [`ElementNode::from_value_lossy`].
#[derive(Debug, Clone, PartialEq)]
pub struct LiftedNode {
    /// The lifted tree.
    pub node: ElementNode,
    /// Number of nodes or members that had to be dropped or reset.
    pub degraded: usize,
}

fn lift_node(value: &Value, depth: usize, degraded: &mut usize) -> Option<ElementNode> {
    let obj = value.as_object()?;

    let kind = obj
        .get("elType")
        .and_then(Value::as_str)
        .and_then(ElementKind::parse)
        .or_else(|| {
            // widgets exported without elType still carry widgetType
            obj.get("widgetType")
                .and_then(Value::as_str)
                .map(|_| ElementKind::Widget)
        })?;
    let widget_type = obj
        .get("widgetType")
        .and_then(Value::as_str)
        .map(str::to_string);
    let kind = NodeKind::from_parts(kind, widget_type)?;

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => NodeId::new(s.clone()),
        Some(Value::Number(n)) => NodeId::new(n.to_string()),
        _ => NodeId::generate(),
    };

    let settings = match obj.get("settings") {
        Some(Value::Object(map)) => map.clone(),
        // PHP encodes an empty associative array as []
        None | Some(Value::Null) => Settings::new(),
        Some(Value::Array(items)) if items.is_empty() => Settings::new(),
        Some(_) => {
            *degraded += 1;
            Settings::new()
        }
    };

    let raw_children = obj.get("elements").or_else(|| obj.get("children"));
    let mut children = Vec::new();
    match raw_children {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) if depth + 1 >= MAX_DEPTH => {
            if !items.is_empty() {
                tracing::warn!(
                    "Dropping {} children of {id}: depth ceiling {MAX_DEPTH} reached",
                    items.len()
                );
                *degraded += items.len();
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                match lift_node(item, depth + 1, degraded) {
                    Some(child) => children.push(child),
                    None => *degraded += 1,
                }
            }
        }
        Some(_) => *degraded += 1,
    }

    let is_inner = obj.get("isInner").and_then(Value::as_bool).unwrap_or(false);

    Some(ElementNode {
        id,
        kind,
        settings,
        children,
        is_inner,
    })
}
