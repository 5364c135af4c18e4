//! Core types for the normalized dependency schema

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where an installed dependency came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    /// The default npm registry (serialized as `"npm"`)
    Registry,
    /// A git repository
    Git,
    /// A local tarball
    File,
    /// A local directory
    Directory,
    /// Any other host; the URL itself identifies the source
    Url(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Registry => f.write_str("npm"),
            Source::Git => f.write_str("git"),
            Source::File => f.write_str("file"),
            Source::Directory => f.write_str("directory"),
            Source::Url(url) => f.write_str(url),
        }
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        match value.as_str() {
            "npm" | "registry" => Source::Registry,
            "git" => Source::Git,
            "file" => Source::File,
            "directory" => Source::Directory,
            _ => Source::Url(value),
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.to_string()
    }
}

/// How a parent declares a child dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    /// Listed under `dependencies` (or `requires`)
    Direct,
    /// Listed under `optionalDependencies`
    Optional,
}

/// A child edge of a [`DependencyRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDependency {
    /// Range the parent asks for
    pub constraint: String,
    /// Declaration kind
    pub relationship: Relationship,
    /// Version installed for this parent when it differs from the root install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<String>,
}

impl ChildDependency {
    /// Create a child edge without a per-branch install override
    pub fn new(constraint: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            constraint: constraint.into(),
            relationship,
            installed: None,
        }
    }
}

/// One entry of the normalized dependency graph.
///
/// `is_transitive` is derived from `constraint` at construction time: a record
/// is direct exactly when a root-level manifest constraint references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Package name (the key of the owning map)
    #[serde(skip)]
    pub name: String,
    /// Installed version, if the lockfile records one
    #[serde(
        default,
        rename = "installed",
        with = "installed_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub installed_version: Option<String>,
    /// Root-level manifest constraint (direct dependencies only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// True when no root-level manifest constraint references this package
    pub is_transitive: bool,
    /// Where the installed copy came from
    pub source: Source,
    /// Declared children
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ChildDependency>,
    /// Nested installs below this one (pre-v3 package-lock.json only)
    #[serde(default, rename = "dependencies", skip_serializing_if = "BTreeMap::is_empty")]
    pub nested: BTreeMap<String, DependencyRecord>,
    /// Versions strictly newer than what is installed, ascending
    #[serde(default, rename = "available", skip_serializing_if = "Vec::is_empty")]
    pub available_versions: Vec<String>,
}

impl DependencyRecord {
    /// Create a record; it is direct iff `constraint` is present.
    pub fn new(
        name: impl Into<String>,
        installed_version: Option<String>,
        constraint: Option<String>,
        source: Source,
    ) -> Self {
        Self {
            name: name.into(),
            installed_version,
            is_transitive: constraint.is_none(),
            constraint,
            source,
            children: BTreeMap::new(),
            nested: BTreeMap::new(),
            available_versions: Vec::new(),
        }
    }

    /// Whether a manifest names this package directly
    pub fn is_direct(&self) -> bool {
        !self.is_transitive
    }
}

/// The installed version serializes as `{"name": "<version>"}`.
mod installed_version {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Installed {
        name: String,
    }

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(version) => Installed {
                name: version.clone(),
            }
            .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<Installed>::deserialize(deserializer)?.map(|i| i.name))
    }
}

/// A normalized lockfile: the dependency graph plus a content fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedLockfile {
    /// Root-level records by name
    pub dependencies: BTreeMap<String, DependencyRecord>,
    /// SHA-256 of the lockfile contents
    pub fingerprint: String,
}

impl NormalizedLockfile {
    /// Look up a root-level record
    pub fn get(&self, name: &str) -> Option<&DependencyRecord> {
        self.dependencies.get(name)
    }
}

/// A manifest-level view of one direct dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySummary {
    /// Constraint as written in the manifest
    pub constraint: String,
    /// Where the constraint points
    pub source: Source,
    /// Installed version, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<String>,
    /// Newer versions the registry offers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

/// A single constraint rewrite that was applied to a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    /// Package name
    pub package: String,
    /// Old constraint
    pub old_constraint: String,
    /// New constraint
    pub new_constraint: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_wire_shape() {
        let mut record = DependencyRecord::new(
            "react",
            Some("18.2.0".to_string()),
            Some("^18.0.0".to_string()),
            Source::Registry,
        );
        record.children.insert(
            "loose-envify".to_string(),
            ChildDependency::new("^1.1.0", Relationship::Direct),
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "installed": {"name": "18.2.0"},
                "constraint": "^18.0.0",
                "is_transitive": false,
                "source": "npm",
                "children": {
                    "loose-envify": {"constraint": "^1.1.0", "relationship": "direct"}
                }
            })
        );
    }

    #[test]
    fn test_transitive_record_omits_constraint() {
        let record = DependencyRecord::new(
            "js-tokens",
            Some("4.0.0".to_string()),
            None,
            Source::Url("https://example.com/js-tokens.tgz".to_string()),
        );
        assert!(record.is_transitive);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["source"], "https://example.com/js-tokens.tgz");
        assert!(value.get("constraint").is_none());
    }

    #[test]
    fn test_record_deserializes_installed() {
        let record: DependencyRecord = serde_json::from_value(json!({
            "installed": {"name": "1.0.0"},
            "is_transitive": true,
            "source": "git"
        }))
        .unwrap();
        assert_eq!(record.installed_version.as_deref(), Some("1.0.0"));
        assert_eq!(record.source, Source::Git);
    }
}
