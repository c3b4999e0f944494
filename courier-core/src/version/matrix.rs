//! Static family compatibility matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Families a source family can be pasted into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyCompatibility {
    /// Target families that work without caveats.
    #[serde(default)]
    pub compatible: Vec<String>,
    /// Target families that work with caveats.
    #[serde(default)]
    pub warning: Vec<String>,
}

/// How a source family relates to a target family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Same family; no conversion needed.
    SameFamily,
    /// Listed as compatible.
    Compatible,
    /// Listed as compatible with caveats.
    Warning,
    /// Listed in neither list.
    Incompatible,
    /// Version missing, unparseable or its family is not in the matrix.
    Unknown,
}

/// Source family to compatible/warning target families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompatibilityMatrix {
    families: BTreeMap<String, FamilyCompatibility>,
}

impl Default for CompatibilityMatrix {
    fn default() -> Self {
        let entry = |compatible: &[&str], warning: &[&str]| FamilyCompatibility {
            compatible: compatible.iter().map(ToString::to_string).collect(),
            warning: warning.iter().map(ToString::to_string).collect(),
        };
        let mut families = BTreeMap::new();
        families.insert("3.x".to_string(), entry(&["3.x"], &["2.x"]));
        families.insert("2.x".to_string(), entry(&["2.x"], &["1.x", "3.x"]));
        families.insert("1.x".to_string(), entry(&["1.x"], &["2.x"]));
        Self { families }
    }
}

impl CompatibilityMatrix {
    /// Empty matrix.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// Set the entry for a source family.
    #[must_use]
    pub fn with_family(mut self, family: impl Into<String>, entry: FamilyCompatibility) -> Self {
        self.families.insert(family.into(), entry);
        self
    }

    /// Classify pasting `source` family content into `target` family.
    #[must_use]
    pub fn classify(&self, source: &str, target: &str) -> Classification {
        if source == target {
            return Classification::SameFamily;
        }
        let Some(entry) = self.families.get(source) else {
            return Classification::Unknown;
        };
        if entry.compatible.iter().any(|f| f == target) {
            Classification::Compatible
        } else if entry.warning.iter().any(|f| f == target) {
            Classification::Warning
        } else {
            Classification::Incompatible
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matrix() {
        let m = CompatibilityMatrix::default();
        assert_eq!(m.classify("3.x", "3.x"), Classification::SameFamily);
        assert_eq!(m.classify("2.x", "3.x"), Classification::Warning);
        assert_eq!(m.classify("3.x", "1.x"), Classification::Incompatible);
        assert_eq!(m.classify("4.x", "3.x"), Classification::Unknown);
    }

    #[test]
    fn test_custom_family() {
        let m = CompatibilityMatrix::empty().with_family(
            "4.x",
            FamilyCompatibility {
                compatible: vec!["3.x".into()],
                warning: vec![],
            },
        );
        assert_eq!(m.classify("4.x", "3.x"), Classification::Compatible);
        assert_eq!(m.classify("4.x", "2.x"), Classification::Incompatible);
    }

    #[test]
    fn test_matrix_json_shape() {
        let json = serde_json::to_value(CompatibilityMatrix::default()).expect("serialize");
        assert_eq!(json["2.x"]["warning"][0], "1.x");
    }
}
