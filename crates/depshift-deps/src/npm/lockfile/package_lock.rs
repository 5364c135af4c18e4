//! package-lock.json normalization

use super::{source_from_resolved, FormatNormalizer};
use crate::npm::manifest::classify_source;
use crate::npm::workspace::ManifestSet;
use crate::types::{ChildDependency, DependencyRecord, Relationship, Source};
use crate::version::parse_version;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PackageLockV1 {
    #[serde(default)]
    dependencies: BTreeMap<String, V1Entry>,
}

#[derive(Debug, Deserialize)]
struct V1Entry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    bundled: bool,
    #[serde(default)]
    requires: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: BTreeMap<String, V1Entry>,
}

#[derive(Debug, Deserialize)]
struct PackageLockV3 {
    #[serde(default)]
    packages: BTreeMap<String, V3Entry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V3Entry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    resolved: Option<String>,
    #[serde(default)]
    in_bundle: bool,
    #[serde(default)]
    link: bool,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, String>,
}

fn parse<'de, T: Deserialize<'de>>(path: &Path, contents: &'de str) -> Result<T> {
    serde_json::from_str(contents).map_err(|e| Error::InvalidFormat(path.to_path_buf(), e.to_string()))
}

/// Normalizer for the nested `dependencies` tree of lockfileVersion 1 and 2
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLockV1Normalizer;

impl PackageLockV1Normalizer {
    fn walk(
        entries: &BTreeMap<String, V1Entry>,
        scope: Option<&ManifestSet>,
    ) -> BTreeMap<String, DependencyRecord> {
        entries
            .iter()
            .filter(|(_, entry)| !entry.bundled)
            .map(|(name, entry)| {
                // Only the top level of the tree can be direct.
                let constraint = scope.and_then(|s| s.constraint_for(name)).map(String::from);
                // git and file installs keep their spec in `version`
                let (installed, source) = match entry.version.as_deref() {
                    Some(version) if parse_version(version).is_err() => (None, classify_source(version)),
                    _ => (
                        entry.version.clone(),
                        source_from_resolved(entry.resolved.as_deref()),
                    ),
                };
                let mut record = DependencyRecord::new(name.as_str(), installed, constraint, source);
                record.children = entry
                    .requires
                    .iter()
                    .map(|(child, range)| {
                        (child.clone(), ChildDependency::new(range, Relationship::Direct))
                    })
                    .collect();
                record.nested = Self::walk(&entry.dependencies, None);
                (name.clone(), record)
            })
            .collect()
    }
}

impl FormatNormalizer for PackageLockV1Normalizer {
    fn normalize(
        &self,
        path: &Path,
        contents: &str,
        scope: &ManifestSet,
    ) -> Result<BTreeMap<String, DependencyRecord>> {
        let lock: PackageLockV1 = parse(path, contents)?;
        Ok(Self::walk(&lock.dependencies, Some(scope)))
    }
}

/// Normalizer for the flat `packages` map of lockfileVersion 3
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLockV3Normalizer;

/// Package name for a top-level install path (`node_modules/x`,
/// `node_modules/@scope/x`); `None` for the root and nested installs.
fn top_level_name(install_path: &str) -> Option<&str> {
    let rest = install_path.strip_prefix("node_modules/")?;
    let segments: Vec<&str> = rest.split('/').collect();
    let expected = if rest.starts_with('@') { 2 } else { 1 };
    if segments.len() != expected || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    Some(rest)
}

impl FormatNormalizer for PackageLockV3Normalizer {
    fn normalize(
        &self,
        path: &Path,
        contents: &str,
        scope: &ManifestSet,
    ) -> Result<BTreeMap<String, DependencyRecord>> {
        let lock: PackageLockV3 = parse(path, contents)?;

        let mut records = BTreeMap::new();
        for (install_path, entry) in &lock.packages {
            let Some(name) = top_level_name(install_path) else {
                continue;
            };
            if entry.in_bundle {
                continue;
            }

            let source = if entry.link {
                Source::Directory
            } else {
                source_from_resolved(entry.resolved.as_deref())
            };
            let mut record = DependencyRecord::new(
                name,
                entry.version.clone(),
                scope.constraint_for(name).map(String::from),
                source,
            );
            for (child, range) in &entry.dependencies {
                record
                    .children
                    .insert(child.clone(), ChildDependency::new(range, Relationship::Direct));
            }
            for (child, range) in &entry.optional_dependencies {
                record
                    .children
                    .insert(child.clone(), ChildDependency::new(range, Relationship::Optional));
            }
            records.insert(name.to_string(), record);
        }

        Ok(records)
    }
}
