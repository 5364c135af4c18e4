//! Available-version resolution against the registry

use crate::traits::{PackageVersions, RegistryClient};
use crate::version::{greater_than_range, is_valid_range, parse_version};
use crate::Result;
use depshift_config::RegistrySettings;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Registry answers memoized for one run, keyed by package name.
///
/// Only successful queries are stored, so a failed lookup is retried the next
/// time the same name comes up.
#[derive(Debug, Default)]
pub struct VersionCache {
    entries: HashMap<String, PackageVersions>,
}

impl VersionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached answer for `name`
    pub fn get(&self, name: &str) -> Option<&PackageVersions> {
        self.entries.get(name)
    }

    /// Store an answer; the first answer for a name wins
    pub fn insert(&mut self, name: &str, versions: PackageVersions) {
        self.entries.entry(name.to_string()).or_insert(versions);
    }

    /// Number of cached names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A registry query that produced no data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFailure {
    /// Package name
    pub name: String,
    /// Why the query failed
    pub reason: String,
}

/// Computes the versions a dependency could move to.
pub struct VersionResolver<'a> {
    registry: &'a dyn RegistryClient,
    cache: &'a mut VersionCache,
    settings: &'a RegistrySettings,
    failures: Vec<RegistryFailure>,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver over `registry`, memoizing into `cache`
    pub fn new(
        registry: &'a dyn RegistryClient,
        cache: &'a mut VersionCache,
        settings: &'a RegistrySettings,
    ) -> Self {
        Self {
            registry,
            cache,
            settings,
            failures: Vec::new(),
        }
    }

    /// Versions of `name` above `constraint`, in registry order.
    ///
    /// `constraint` is the root-level manifest constraint; passing one marks the
    /// dependency as direct, which caps the result at the distribution tag in
    /// effect. Registry failures yield an empty list and are recorded.
    ///
    /// # Errors
    /// `InvalidVersion` when the tag in effect points at a non-semver version.
    pub fn available_versions(&mut self, name: &str, constraint: Option<&str>) -> Result<Vec<String>> {
        let Some(info) = self.lookup(name) else {
            return Ok(Vec::new());
        };

        let mut candidates = Vec::with_capacity(info.versions.len());
        for raw in &info.versions {
            match parse_version(raw) {
                Ok(version) => candidates.push((raw.clone(), version)),
                Err(_) => debug!("Skipping non-semver version {} of {}", raw, name),
            }
        }

        if let Some(constraint) = constraint {
            if !info.dist_tags.is_empty() {
                let tag = self.tag_for(name, constraint, &info);
                match info.dist_tags.get(tag) {
                    Some(target) => {
                        let ceiling = parse_version(target)?;
                        debug!("{} is capped at {} ({})", name, target, tag);
                        candidates.retain(|(_, version)| *version <= ceiling);
                    }
                    None => debug!("{} has no '{}' tag, not capping", name, tag),
                }
            }

            if is_valid_range(constraint) {
                let mut above = Vec::with_capacity(candidates.len());
                for (raw, version) in candidates {
                    if greater_than_range(&raw, constraint)? {
                        above.push((raw, version));
                    }
                }
                candidates = above;
            }
        }

        Ok(candidates.into_iter().map(|(raw, _)| raw).collect())
    }

    /// Drain the registry failures recorded so far
    pub fn take_failures(&mut self) -> Vec<RegistryFailure> {
        std::mem::take(&mut self.failures)
    }

    fn lookup(&mut self, name: &str) -> Option<PackageVersions> {
        if let Some(hit) = self.cache.get(name) {
            return Some(hit.clone());
        }

        match self.registry.package_versions(name) {
            Ok(info) => {
                self.cache.insert(name, info.clone());
                Some(info)
            }
            Err(e) => {
                warn!("Registry query for {} failed: {}", name, e);
                self.failures.push(RegistryFailure {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn tag_for<'t>(&'t self, name: &str, constraint: &'t str, info: &PackageVersions) -> &'t str {
        let constraint = constraint.trim();
        if info.dist_tags.contains_key(constraint) {
            constraint
        } else if let Some(tag) = self.settings.tag_overrides.get(name) {
            tag
        } else {
            &self.settings.default_tag
        }
    }
}
