use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main settings structure for depshift
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Raise manifest range lower bounds to the installed versions after a
    /// lockfile update
    #[serde(default)]
    pub update_lower_bounds: bool,

    /// Which manifest sections count as dependencies
    #[serde(default)]
    pub manifest: ManifestSettings,

    /// Distribution-tag handling
    #[serde(default)]
    pub registry: RegistrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            update_lower_bounds: false,
            manifest: ManifestSettings::default(),
            registry: RegistrySettings::default(),
        }
    }
}

impl Settings {
    /// Manifest sections to collect, in lookup order.
    ///
    /// `devDependencies` is dropped in production mode.
    pub fn dependency_sections(&self) -> Vec<String> {
        self.manifest
            .dependency_types
            .iter()
            .filter(|t| !(self.manifest.node_env.is_production() && *t == "devDependencies"))
            .cloned()
            .collect()
    }
}

/// Manifest section settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestSettings {
    /// Dependency sections of package.json to read and rewrite
    #[serde(default = "default_dependency_types")]
    pub dependency_types: Vec<String>,

    /// Environment the project is installed for
    #[serde(default)]
    pub node_env: NodeEnv,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            dependency_types: default_dependency_types(),
            node_env: NodeEnv::default(),
        }
    }
}

/// The `NODE_ENV` the project is installed under.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeEnv {
    /// Development install (default)
    #[default]
    Development,
    /// Production install: dev dependencies are ignored
    Production,
    /// Test runs
    Test,
}

impl NodeEnv {
    /// Parse an environment value; anything unrecognised is development.
    pub fn from_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Whether dev dependencies should be skipped
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Distribution-tag settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrySettings {
    /// Tag that caps available versions when nothing more specific applies
    #[serde(default = "default_tag")]
    pub default_tag: String,

    /// Per-dependency tag overrides (name -> tag)
    #[serde(default)]
    pub tag_overrides: BTreeMap<String, String>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            default_tag: default_tag(),
            tag_overrides: BTreeMap::new(),
        }
    }
}

fn default_dependency_types() -> Vec<String> {
    vec!["dependencies".to_string(), "devDependencies".to_string()]
}

fn default_tag() -> String {
    "latest".to_string()
}
