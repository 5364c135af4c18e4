//! Raising manifest range lower bounds to what is installed

use crate::npm::{locate_lockfile, ManifestDocument};
use crate::range::rewrite_lower_bound;
use crate::traits::{InstalledVersions, PackageManager};
use crate::types::AppliedUpdate;
use crate::version::{is_valid_range, ranges_equivalent};
use crate::{Error, Result};
use depshift_config::Settings;
use depshift_fs::FileSystem;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a lower-bound pass over one manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowerBoundReport {
    /// Rewrites that were written to the manifest
    pub applied: Vec<AppliedUpdate>,
    /// Whether the lockfile was regenerated afterwards
    pub lockfile_regenerated: bool,
}

impl LowerBoundReport {
    /// Whether the manifest changed
    pub fn has_changes(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Rewrites each range in a manifest so its lower bound is the installed
/// version, keeping `^`/`~` shorthand.
pub struct RangeLowerBoundUpdater<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    settings: &'a Settings,
    installed: &'a dyn InstalledVersions,
    package_manager: &'a dyn PackageManager,
}

impl<'a, F: FileSystem + ?Sized> RangeLowerBoundUpdater<'a, F> {
    /// Create an updater
    pub fn new(
        fs: &'a F,
        settings: &'a Settings,
        installed: &'a dyn InstalledVersions,
        package_manager: &'a dyn PackageManager,
    ) -> Self {
        Self {
            fs,
            settings,
            installed,
            package_manager,
        }
    }

    /// Run the pass over the manifest in `dir`.
    ///
    /// Dependencies without an installed version, or whose version math fails,
    /// are skipped. When anything changed, the lockfile is regenerated, but only
    /// if one already existed.
    ///
    /// # Errors
    /// Loading the manifest, writing it, or regenerating the lockfile.
    pub fn update_dir(&self, dir: &Path) -> Result<LowerBoundReport> {
        let mut manifest = ManifestDocument::load(self.fs, dir, self.settings)?;
        let mut report = LowerBoundReport::default();

        for (name, constraint) in manifest.unique_dependencies() {
            if !is_valid_range(&constraint) {
                continue;
            }
            debug!("{} uses a range constraint of {}", name, constraint);

            let installed = match self.installed.installed_version(manifest.dir(), &name) {
                Ok(Some(version)) => version,
                Ok(None) => {
                    debug!("{} is not installed, skipping", name);
                    continue;
                }
                Err(e) => {
                    warn!("Could not determine installed version of {}: {}", name, e);
                    continue;
                }
            };

            let updated = match self.lower_bound_for(&constraint, &installed) {
                Ok(Some(updated)) => updated,
                Ok(None) => continue,
                Err(e @ Error::InvalidVersion(..)) => {
                    warn!("Skipping {}: {}", name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            info!("Updating range for {} from {} to {}", name, constraint, updated);
            manifest.rewrite_constraint(self.fs, &name, &updated)?;
            report.applied.push(AppliedUpdate {
                package: name,
                old_constraint: constraint,
                new_constraint: updated,
            });
        }

        if report.has_changes() {
            let (lockfile, existed) = locate_lockfile(self.fs, manifest.dir())?;
            if existed {
                info!("Regenerating {} after range changes", lockfile.display());
                self.package_manager.generate_lockfile(&lockfile)?;
                report.lockfile_regenerated = true;
            }
        }

        Ok(report)
    }

    /// The rewritten range, or `None` when it means the same as `constraint`
    fn lower_bound_for(&self, constraint: &str, installed: &str) -> Result<Option<String>> {
        let updated = rewrite_lower_bound(constraint, installed)?;
        if ranges_equivalent(constraint, &updated)? {
            Ok(None)
        } else {
            Ok(Some(updated))
        }
    }
}
