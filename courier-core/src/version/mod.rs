//! Version compatibility and conversion.
//!
//! Builder versions are grouped into families (`"3.x"`). Content is always
//! converted on a best-effort basis: an unknown or incompatible version is
//! reported, never refused.

pub mod matrix;
pub mod rules;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::ElementNode;

pub use matrix::{Classification, CompatibilityMatrix, FamilyCompatibility};
pub use rules::{apply_rules, migration_path, MigrationRule, RuleSet};

/// A parsed builder version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuilderVersion {
    /// Major version.
    pub major: u64,
    /// Minor version.
    pub minor: u64,
    /// Patch version.
    pub patch: u64,
}

impl BuilderVersion {
    /// Create a version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string. Strict semver first, then a lenient reading
    /// of leading numeric components (`"3.5"`, `"v3.21.2-beta"`).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(v) = semver::Version::parse(raw) {
            return Some(Self::new(v.major, v.minor, v.patch));
        }
        let raw = raw.trim_start_matches(['v', 'V']);
        let mut parts = raw
            .split(|c: char| !c.is_ascii_digit() && c != '.')
            .next()
            .unwrap_or_default()
            .split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// Version family, `"<major>.x"`.
    #[must_use]
    pub fn family(&self) -> String {
        format!("{}.x", self.major)
    }
}

impl fmt::Display for BuilderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for BuilderVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid builder version '{s}'"))
    }
}

/// Outcome of a compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    /// Whether a paste is expected to work.
    pub compatible: bool,
    /// Whether the user should be warned.
    pub warning: bool,
    /// Human-readable explanation.
    pub message: String,
    /// Matrix classification.
    pub classification: Classification,
}

/// Severity of the notice a conversion deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// Nothing worth telling the user.
    Silent,
    /// Informational.
    Info,
    /// Something may look different.
    Warning,
    /// Likely broken.
    Error,
}

/// Result of [`VersionResolver::convert`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Converted tree (a new tree; the input is never mutated).
    pub tree: ElementNode,
    /// Number of times a rule fired.
    pub rules_applied: usize,
    /// Compatibility of the two versions.
    pub compatibility: Compatibility,
}

impl ConversionResult {
    /// Notice the caller should show: silent when families match and no
    /// rule fired, informational when rules fired or families differ,
    /// warning or error per the matrix otherwise.
    #[must_use]
    pub fn notice_level(&self) -> NoticeLevel {
        let c = &self.compatibility;
        if !c.compatible {
            NoticeLevel::Error
        } else if c.warning {
            NoticeLevel::Warning
        } else if self.rules_applied > 0 || c.classification != Classification::SameFamily {
            NoticeLevel::Info
        } else {
            NoticeLevel::Silent
        }
    }
}

/// Classifies version pairs and converts trees between them.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    matrix: CompatibilityMatrix,
    rules: RuleSet,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self {
            matrix: CompatibilityMatrix::default(),
            rules: RuleSet::builtin(),
        }
    }
}

impl VersionResolver {
    /// Resolver with the default matrix and built-in rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rule set.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the compatibility matrix.
    #[must_use]
    pub fn with_matrix(mut self, matrix: CompatibilityMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// The active rule set.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Check whether content from `source` can be pasted into `target`.
    #[must_use]
    pub fn is_compatible(&self, source: &str, target: &str) -> Compatibility {
        let (Some(src), Some(tgt)) = (BuilderVersion::parse(source), BuilderVersion::parse(target))
        else {
            return Compatibility {
                compatible: true,
                warning: true,
                message: format!(
                    "Unknown builder version ('{source}' -> '{target}'), pasting on a best-effort basis"
                ),
                classification: Classification::Unknown,
            };
        };
        let (sf, tf) = (src.family(), tgt.family());
        let classification = self.matrix.classify(&sf, &tf);
        let (compatible, warning, message) = match classification {
            Classification::SameFamily => (true, false, format!("Same version family ({sf})")),
            Classification::Compatible => (true, false, format!("{sf} content is compatible with {tf}")),
            Classification::Warning => (
                true,
                true,
                format!("{sf} content may need adjustments in {tf}"),
            ),
            Classification::Incompatible => (
                false,
                false,
                format!("{sf} content is not compatible with {tf}, attempting best-effort conversion"),
            ),
            Classification::Unknown => (
                true,
                true,
                format!("No compatibility data for {sf}, pasting on a best-effort basis"),
            ),
        };
        Compatibility {
            compatible,
            warning,
            message,
            classification,
        }
    }

    /// Convert a tree from `source` to `target` version.
    ///
    /// Same-family pairs and unparseable versions apply no rules. Every
    /// other pair applies the rules of its migration path, whether the
    /// matrix calls the pair compatible, incompatible or does not know it.
    #[must_use]
    pub fn convert(&self, tree: &ElementNode, source: &str, target: &str) -> ConversionResult {
        let compatibility = self.is_compatible(source, target);
        let rules = match (BuilderVersion::parse(source), BuilderVersion::parse(target)) {
            _ if compatibility.classification == Classification::SameFamily => &[][..],
            (Some(src), Some(tgt)) => self.rules.rules_for(&src.family(), &tgt.family()),
            _ => &[][..],
        };
        let (tree, rules_applied) = apply_rules(tree, rules);
        tracing::debug!(
            "Converted {source} -> {target}: {:?}, {rules_applied} rules applied",
            compatibility.classification
        );
        ConversionResult {
            tree,
            rules_applied,
            compatibility,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!(BuilderVersion::parse("3.21.4"), Some(BuilderVersion::new(3, 21, 4)));
        assert_eq!(BuilderVersion::parse("3.5"), Some(BuilderVersion::new(3, 5, 0)));
        assert_eq!(BuilderVersion::parse("v2.9.1-beta"), Some(BuilderVersion::new(2, 9, 1)));
        assert_eq!(BuilderVersion::parse("3.0.0-rc1"), Some(BuilderVersion::new(3, 0, 0)));
        assert_eq!(BuilderVersion::parse(""), None);
        assert_eq!(BuilderVersion::parse("latest"), None);
        assert_eq!(BuilderVersion::new(3, 1, 0).family(), "3.x");
        assert_eq!("1.2.3".parse::<BuilderVersion>().expect("parse").to_string(), "1.2.3");
    }

    #[test]
    fn test_same_family_is_silent_noop() {
        let tree = ElementNode::widget("heading").with_setting("title", "Hi");
        let result = VersionResolver::new().convert(&tree, "3.5.0", "3.9.2");
        assert_eq!(result.rules_applied, 0);
        assert_eq!(result.tree, tree);
        assert!(result.compatibility.compatible);
        assert_eq!(result.notice_level(), NoticeLevel::Silent);
    }

    #[test]
    fn test_unknown_version_is_warning_without_rules() {
        let tree = ElementNode::widget("icon").with_setting("icon", "x");
        let result = VersionResolver::new().convert(&tree, "", "3.1.0");
        assert_eq!(result.rules_applied, 0);
        assert!(result.compatibility.compatible);
        assert!(result.compatibility.warning);
        assert_eq!(result.compatibility.classification, Classification::Unknown);
        assert_eq!(result.notice_level(), NoticeLevel::Warning);
    }

    #[test]
    fn test_cross_family_applies_rules() {
        let tree = ElementNode::widget("icon").with_setting("icon", "x");
        let result = VersionResolver::new().convert(&tree, "2.9.0", "3.1.0");
        assert_eq!(result.rules_applied, 1);
        assert!(result.tree.settings.contains_key("selected_icon"));
        assert_eq!(result.notice_level(), NoticeLevel::Warning);
    }

    #[test]
    fn test_incompatible_still_converts() {
        let rules = RuleSet::new().with_rule("3.x_to_1.x", MigrationRule::widget_rename("a", "b"));
        let resolver = VersionResolver::new().with_rules(rules);
        let result = resolver.convert(&ElementNode::widget("a"), "3.0.0", "1.4.0");
        assert!(!result.compatibility.compatible);
        assert_eq!(result.rules_applied, 1);
        assert_eq!(result.tree.widget_type(), Some("b"));
        assert_eq!(result.notice_level(), NoticeLevel::Error);
    }

    #[test]
    fn test_family_outside_matrix_still_converts() {
        let rules = RuleSet::new().with_rule("4.x_to_3.x", MigrationRule::widget_rename("a", "b"));
        let resolver = VersionResolver::new().with_rules(rules);
        let result = resolver.convert(&ElementNode::widget("a"), "4.0.0", "3.1.0");
        assert_eq!(result.compatibility.classification, Classification::Unknown);
        assert_eq!(result.rules_applied, 1);
        assert_eq!(result.tree.widget_type(), Some("b"));
        assert_eq!(result.notice_level(), NoticeLevel::Warning);
    }

    #[test]
    fn test_compatible_cross_family_is_info() {
        let matrix = CompatibilityMatrix::empty().with_family(
            "4.x",
            FamilyCompatibility {
                compatible: vec!["3.x".into()],
                warning: vec![],
            },
        );
        let resolver = VersionResolver::new().with_matrix(matrix);
        let result = resolver.convert(&ElementNode::section(), "4.0.0", "3.2.0");
        assert_eq!(result.rules_applied, 0);
        assert_eq!(result.notice_level(), NoticeLevel::Info);
    }

    #[test]
    fn test_compatibility_serializes_camel_case() {
        let c = VersionResolver::new().is_compatible("2.0.0", "3.0.0");
        let json = serde_json::to_value(&c).expect("serialize");
        assert_eq!(json["compatible"], true);
        assert_eq!(json["warning"], true);
        assert_eq!(json["classification"], "warning");
    }
}
