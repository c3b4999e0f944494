//! Declarative migration rules.
//!
//! A rule set maps a migration path (`"2.x_to_3.x"`) to an ordered list of
//! rules. Rules are loaded from JSON so new tables need no code:
//!
//! ```json
//! {
//!   "2.x_to_3.x": [
//!     { "type": "widget-rename", "from": "image-box", "to": "icon-box" },
//!     { "type": "setting-rename", "widget": "icon", "from": "icon", "to": "selected_icon" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::element::{ElementNode, NodeKind, Settings, MAX_DEPTH};

/// One migration rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MigrationRule {
    /// Rename a widget type wherever it occurs.
    WidgetRename {
        /// Old widget type.
        from: String,
        /// New widget type.
        to: String,
    },
    /// Rename a settings key, optionally only on one widget type.
    SettingRename {
        /// Widget type the rule is scoped to; all nodes when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        widget: Option<String>,
        /// Old key.
        from: String,
        /// New key.
        to: String,
    },
}

impl MigrationRule {
    /// Widget rename rule.
    #[must_use]
    pub fn widget_rename(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::WidgetRename {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Setting rename rule.
    #[must_use]
    pub fn setting_rename(
        widget: Option<&str>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::SettingRename {
            widget: widget.map(str::to_string),
            from: from.into(),
            to: to.into(),
        }
    }

    /// The rule with source and target swapped.
    #[must_use]
    pub fn reversed(&self) -> Self {
        match self {
            Self::WidgetRename { from, to } => Self::WidgetRename {
                from: to.clone(),
                to: from.clone(),
            },
            Self::SettingRename { widget, from, to } => Self::SettingRename {
                widget: widget.clone(),
                from: to.clone(),
                to: from.clone(),
            },
        }
    }

    /// Apply to one node. Returns whether the rule fired.
    fn apply(&self, node: &mut ElementNode) -> bool {
        match self {
            Self::WidgetRename { from, to } => match &mut node.kind {
                NodeKind::Widget { widget_type } if *widget_type == *from => {
                    widget_type.clone_from(to);
                    true
                }
                _ => false,
            },
            Self::SettingRename { widget, from, to } => {
                if let Some(scope) = widget {
                    if node.widget_type() != Some(scope.as_str()) {
                        return false;
                    }
                }
                if !node.settings.contains_key(from) || node.settings.contains_key(to) {
                    return false;
                }
                node.settings = rename_key(&node.settings, from, to);
                true
            }
        }
    }
}

/// Rename a key in place order.
fn rename_key(settings: &Settings, from: &str, to: &str) -> Settings {
    settings
        .iter()
        .map(|(k, v)| {
            let key = if k == from { to.to_string() } else { k.clone() };
            (key, v.clone())
        })
        .collect()
}

/// Migration path key for two families.
#[must_use]
pub fn migration_path(source_family: &str, target_family: &str) -> String {
    format!("{source_family}_to_{target_family}")
}

/// Ordered rules per migration path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    paths: BTreeMap<String, Vec<MigrationRule>>,
}

impl RuleSet {
    /// Empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in rules: the icon library migration between 2.x and 3.x.
    #[must_use]
    pub fn builtin() -> Self {
        let mut forward = Vec::new();
        for widget in ["icon", "icon-box", "icon-list", "button"] {
            forward.push(MigrationRule::setting_rename(Some(widget), "icon", "selected_icon"));
        }
        forward.push(MigrationRule::setting_rename(
            Some("social-icons"),
            "social",
            "social_icon",
        ));
        let backward = forward.iter().map(MigrationRule::reversed).collect();

        let mut paths = BTreeMap::new();
        paths.insert(migration_path("2.x", "3.x"), forward);
        paths.insert(migration_path("3.x", "2.x"), backward);
        Self { paths }
    }

    /// Load a rule set from JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed JSON or unknown rule types.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Append a rule to a path.
    #[must_use]
    pub fn with_rule(mut self, path: impl Into<String>, rule: MigrationRule) -> Self {
        self.paths.entry(path.into()).or_default().push(rule);
        self
    }

    /// Append every rule of `other` after the existing rules of each path.
    pub fn extend(&mut self, other: RuleSet) {
        for (path, rules) in other.paths {
            self.paths.entry(path).or_default().extend(rules);
        }
    }

    /// Rules for a migration between two families.
    #[must_use]
    pub fn rules_for(&self, source_family: &str, target_family: &str) -> &[MigrationRule] {
        self.paths
            .get(&migration_path(source_family, target_family))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Number of rules across all paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.values().map(Vec::len).sum()
    }

    /// Whether no rules are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Apply `rules` to a deep clone of `tree`. Returns the new tree and how
/// many times a rule fired.
#[must_use]
pub fn apply_rules(tree: &ElementNode, rules: &[MigrationRule]) -> (ElementNode, usize) {
    let mut out = tree.clone();
    let mut fired = 0;
    if !rules.is_empty() {
        apply_node(&mut out, rules, 0, &mut fired);
    }
    (out, fired)
}

fn apply_node(node: &mut ElementNode, rules: &[MigrationRule], depth: usize, fired: &mut usize) {
    for rule in rules {
        if rule.apply(node) {
            *fired += 1;
        }
    }
    if depth + 1 >= MAX_DEPTH {
        if !node.children.is_empty() {
            tracing::warn!("Not converting below {}: depth ceiling reached", node.id);
        }
        return;
    }
    for child in &mut node.children {
        apply_node(child, rules, depth + 1, fired);
    }
}
