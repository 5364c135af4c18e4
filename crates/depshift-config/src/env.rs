//! Environment overlay for [`Settings`].

use crate::manager::ConfigError;
use crate::types::{NodeEnv, Settings};
use std::collections::BTreeMap;

/// JSON list of manifest sections, e.g. `["dependencies"]`
pub const MANIFEST_PACKAGE_TYPES: &str = "DEPS_SETTING_MANIFEST_PACKAGE_TYPES";
/// `true`/`false`
pub const UPDATE_LOWER_BOUNDS: &str = "DEPS_SETTING_UPDATE_LOWER_BOUNDS";
/// JSON object of dependency name to distribution tag
pub const DIST_TAGS: &str = "DEPS_SETTING_DIST_TAGS";
/// Distribution tag used when no override applies
pub const DEFAULT_DIST_TAG: &str = "DEPS_SETTING_DEFAULT_DIST_TAG";
/// User-facing node environment setting; wins over `NODE_ENV`
pub const SETTING_NODE_ENV: &str = "SETTING_NODE_ENV";
/// Plain `NODE_ENV`
pub const NODE_ENV: &str = "NODE_ENV";

impl Settings {
    /// Overlay the process environment onto these settings.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(std::env::vars())
    }

    /// Overlay environment variables onto these settings.
    ///
    /// Unset variables leave the current values alone; set-but-malformed JSON
    /// values are errors.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if let Some(raw) = vars.get(MANIFEST_PACKAGE_TYPES) {
            self.manifest.dependency_types = serde_json::from_str(raw)
                .map_err(|e| ConfigError::InvalidEnv(MANIFEST_PACKAGE_TYPES.to_string(), e))?;
        }

        if let Some(raw) = vars.get(SETTING_NODE_ENV).or_else(|| vars.get(NODE_ENV)) {
            self.manifest.node_env = NodeEnv::from_value(raw);
        }

        if let Some(raw) = vars.get(UPDATE_LOWER_BOUNDS) {
            self.update_lower_bounds = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            );
        }

        if let Some(raw) = vars.get(DIST_TAGS) {
            let overrides: BTreeMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| ConfigError::InvalidEnv(DIST_TAGS.to_string(), e))?;
            self.registry.tag_overrides.extend(overrides);
        }

        if let Some(raw) = vars.get(DEFAULT_DIST_TAG) {
            if !raw.trim().is_empty() {
                self.registry.default_tag = raw.trim().to_string();
            }
        }

        Ok(())
    }
}
