//! `{current, updated}` schema pairs and the collect/act flows that build them

use crate::npm::{LockfileDocument, ManifestDocument, ManifestSet};
use crate::resolver::{VersionCache, VersionResolver};
use crate::traits::{InstalledVersions, PackageManager, RegistryClient, WorkingTree, WorkspaceInfo};
use crate::types::{AppliedUpdate, DependencySummary, NormalizedLockfile};
use crate::update::{LowerBoundReport, RangeLowerBoundUpdater};
use crate::version::{is_valid_range, satisfies, update_type};
use crate::{Error, Result};
use depshift_config::Settings;
use depshift_fs::FileSystem;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A `{dependencies: {name: summary}}` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet {
    /// Summaries by name
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySummary>,
}

/// Current and updated views of one manifest.
///
/// Every `updated` key also exists in `current`; inserting an update for an
/// unknown name is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchemaPair")]
pub struct SchemaPair {
    current: DependencySet,
    updated: DependencySet,
}

#[derive(Deserialize)]
struct RawSchemaPair {
    #[serde(default)]
    current: DependencySet,
    #[serde(default)]
    updated: DependencySet,
}

impl TryFrom<RawSchemaPair> for SchemaPair {
    type Error = Error;

    fn try_from(raw: RawSchemaPair) -> Result<Self> {
        let mut pair = SchemaPair {
            current: raw.current,
            updated: DependencySet::default(),
        };
        for (name, summary) in raw.updated.dependencies {
            pair.insert_updated(name, summary)?;
        }
        Ok(pair)
    }
}

impl SchemaPair {
    /// Create an empty pair
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current state of a dependency
    pub fn insert_current(&mut self, name: impl Into<String>, summary: DependencySummary) {
        self.current.dependencies.insert(name.into(), summary);
    }

    /// Record the target state of a dependency already in `current`
    ///
    /// # Errors
    /// `OrphanedUpdate` when `name` has no current entry.
    pub fn insert_updated(&mut self, name: impl Into<String>, summary: DependencySummary) -> Result<()> {
        let name = name.into();
        if !self.current.dependencies.contains_key(&name) {
            return Err(Error::OrphanedUpdate(name));
        }
        self.updated.dependencies.insert(name, summary);
        Ok(())
    }

    /// Current summaries
    pub fn current(&self) -> &BTreeMap<String, DependencySummary> {
        &self.current.dependencies
    }

    /// Updated summaries
    pub fn updated(&self) -> &BTreeMap<String, DependencySummary> {
        &self.updated.dependencies
    }
}

/// A manifest's schema pair plus the lockfile that owns it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestReport {
    /// Current/updated dependency summaries
    #[serde(flatten)]
    pub schema: SchemaPair,
    /// Lockfile the manifest installs into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockfile_path: Option<PathBuf>,
}

/// Normalized lockfile before and after an update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileSchemaPair {
    /// Before the update
    pub current: NormalizedLockfile,
    /// After the update, only when the fingerprint changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<NormalizedLockfile>,
}

impl LockfileSchemaPair {
    /// Pair two snapshots, dropping `updated` when nothing changed
    pub fn new(current: NormalizedLockfile, updated: NormalizedLockfile) -> Self {
        let updated = (updated.fingerprint != current.fingerprint).then_some(updated);
        Self { current, updated }
    }
}

/// Everything collected for one project directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectReport {
    /// Manifest reports by path
    #[serde(default)]
    pub manifests: BTreeMap<PathBuf, ManifestReport>,
    /// Lockfile pairs by path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lockfiles: BTreeMap<PathBuf, LockfileSchemaPair>,
}

/// A manifest or lockfile that an act run had to skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActFailure {
    /// The manifest or lockfile
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// What an act run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActOutcome {
    /// The input report with refreshed lockfile `updated` snapshots
    pub report: CollectReport,
    /// Manifest constraint rewrites taken from the input
    pub applied: Vec<AppliedUpdate>,
    /// Lower-bound passes by manifest directory
    pub lower_bounds: BTreeMap<PathBuf, LowerBoundReport>,
    /// Entries skipped because they could not be parsed or classified
    pub failures: Vec<ActFailure>,
}

/// External collaborators the orchestration needs
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Registry versions and tags
    pub registry: &'a dyn RegistryClient,
    /// Installed versions
    pub installed: &'a dyn InstalledVersions,
    /// Lockfile generation/update
    pub package_manager: &'a dyn PackageManager,
    /// Workspace discovery fallback
    pub workspace_info: &'a dyn WorkspaceInfo,
    /// Working-tree status
    pub working_tree: &'a dyn WorkingTree,
}

/// Builds schema pairs and runs the collect and act flows
pub struct SchemaDiffBuilder<'a, F: FileSystem> {
    fs: Arc<F>,
    settings: &'a Settings,
    collaborators: Collaborators<'a>,
}

impl<'a, F: FileSystem> SchemaDiffBuilder<'a, F> {
    /// Create a builder
    pub fn new(fs: Arc<F>, settings: &'a Settings, collaborators: Collaborators<'a>) -> Self {
        Self {
            fs,
            settings,
            collaborators,
        }
    }

    /// Schema pair for one manifest.
    ///
    /// `current` holds every direct dependency. `updated` holds the ones whose
    /// newest available version falls outside the current constraint.
    pub fn manifest_schema(&self, manifest: &ManifestDocument, resolver: &mut VersionResolver<'_>) -> SchemaPair {
        let mut pair = SchemaPair::new();

        for (name, constraint) in manifest.unique_dependencies() {
            let source = manifest.source_for(&name, &constraint);

            let installed = match self.collaborators.installed.installed_version(manifest.dir(), &name) {
                Ok(version) => version,
                Err(e) => {
                    warn!("Could not determine installed version of {}: {}", name, e);
                    None
                }
            };

            let available = match resolver.available_versions(&name, Some(&constraint)) {
                Ok(versions) => versions,
                Err(e) => {
                    warn!("Could not compute available versions for {}: {}", name, e);
                    Vec::new()
                }
            };

            let target = available
                .last()
                .filter(|newest| is_valid_range(&constraint) && !satisfies(newest, &constraint).unwrap_or(true))
                .map(|newest| {
                    let summary = DependencySummary {
                        constraint: prefixed_constraint(&constraint, newest),
                        source: source.clone(),
                        installed: None,
                        available: Vec::new(),
                    };
                    let kind = installed.as_deref().map(|current| update_type(current, newest));
                    match kind {
                        Some(Ok(kind)) if kind.is_breaking() => {
                            info!("{} can move to {} ({:?}, breaking)", name, summary.constraint, kind)
                        }
                        Some(Ok(kind)) => debug!("{} can move to {} ({:?})", name, summary.constraint, kind),
                        _ => debug!("{} can move to {}", name, summary.constraint),
                    }
                    summary
                });

            pair.insert_current(
                name.clone(),
                DependencySummary {
                    constraint,
                    source,
                    installed,
                    available,
                },
            );
            if let Some(target) = target {
                // the current entry was inserted just above
                if let Err(e) = pair.insert_updated(name, target) {
                    warn!("{}", e);
                }
            }
        }

        pair
    }

    /// Collect manifests and the lockfile for `target` (a directory or a
    /// lockfile path).
    ///
    /// When the lockfile exists it is normalized, updated through the package
    /// manager and normalized again, and every manifest points back at it.
    /// A lockfile that fails to normalize is logged and left out of the report.
    pub fn collect(&self, target: &Path) -> Result<CollectReport> {
        let mut cache = VersionCache::new();
        let mut resolver = VersionResolver::new(self.collaborators.registry, &mut cache, &self.settings.registry);

        let lockfile = LockfileDocument::open(
            self.fs.as_ref(),
            target,
            self.settings,
            self.collaborators.workspace_info,
        )?;
        log_discovery_failures(lockfile.manifests());

        let mut report = CollectReport::default();
        for manifest in lockfile.manifests().manifests() {
            info!("Collecting {}", manifest.path().display());
            report.manifests.insert(
                manifest.path().to_path_buf(),
                ManifestReport {
                    schema: self.manifest_schema(manifest, &mut resolver),
                    lockfile_path: None,
                },
            );
        }

        if lockfile.existed() {
            match self.lockfile_pair(&lockfile, &mut resolver) {
                Ok(pair) => {
                    report.lockfiles.insert(lockfile.path().to_path_buf(), pair);
                    for manifest in report.manifests.values_mut() {
                        manifest.lockfile_path = Some(lockfile.path().to_path_buf());
                    }
                }
                Err(e) => warn!("Skipping lockfile {}: {}", lockfile.path().display(), e),
            }
        }

        let failures = resolver.take_failures();
        if !failures.is_empty() {
            warn!("{} registry queries returned no data", failures.len());
        }

        Ok(report)
    }

    /// Apply an input report.
    ///
    /// 1. Every manifest's `updated` constraints are written, and its lockfile
    ///    is regenerated if it existed.
    /// 2. Every listed lockfile is updated and its `updated` snapshot refreshed.
    /// 3. With lower-bound updates enabled, each lockfile's manifests get a
    ///    lower-bound pass.
    /// 4. Files changed outside of what the report names are an error.
    ///
    /// A manifest or lockfile that cannot be parsed is skipped and listed in
    /// [`ActOutcome::failures`]. Write failures, package-manager failures and
    /// a dirty working tree abort the run.
    pub fn act(&self, input: &CollectReport) -> Result<ActOutcome> {
        let mut outcome = ActOutcome {
            report: input.clone(),
            ..ActOutcome::default()
        };
        let mut failures = Vec::new();
        let mut expected: BTreeSet<PathBuf> = BTreeSet::new();

        for (path, manifest_report) in &input.manifests {
            expected.insert(path.clone());
            if let Some(lockfile_path) = &manifest_report.lockfile_path {
                expected.insert(lockfile_path.clone());
            }
            match self.apply_manifest_updates(path, manifest_report) {
                Ok(applied) => outcome.applied.extend(applied),
                Err(e) => skip_entry(&mut failures, path, e)?,
            }
        }

        let mut cache = VersionCache::new();
        let mut resolver = VersionResolver::new(self.collaborators.registry, &mut cache, &self.settings.registry);

        for (path, pair) in outcome.report.lockfiles.iter_mut() {
            expected.insert(path.clone());
            let lockfile = match LockfileDocument::open(
                self.fs.as_ref(),
                path,
                self.settings,
                self.collaborators.workspace_info,
            ) {
                Ok(lockfile) => lockfile,
                Err(e) => {
                    skip_entry(&mut failures, path, e)?;
                    continue;
                }
            };
            lockfile.update(self.collaborators.package_manager)?;
            match lockfile.normalize(self.fs.as_ref(), Some(&mut resolver)) {
                Ok(updated) => pair.updated = Some(updated),
                Err(e) => skip_entry(&mut failures, path, e)?,
            }

            if self.settings.update_lower_bounds {
                let updater = RangeLowerBoundUpdater::new(
                    self.fs.as_ref(),
                    self.settings,
                    self.collaborators.installed,
                    self.collaborators.package_manager,
                );
                for manifest in lockfile.manifests().manifests() {
                    expected.insert(manifest.path().to_path_buf());
                    match updater.update_dir(manifest.dir()) {
                        Ok(lower) => {
                            outcome.lower_bounds.insert(manifest.dir().to_path_buf(), lower);
                        }
                        Err(e) => skip_entry(&mut failures, manifest.path(), e)?,
                    }
                }
            }
        }

        self.check_working_tree(&expected)?;
        outcome.failures = failures;
        Ok(outcome)
    }

    fn lockfile_pair(&self, lockfile: &LockfileDocument, resolver: &mut VersionResolver<'_>) -> Result<LockfileSchemaPair> {
        let current = lockfile.normalize(self.fs.as_ref(), Some(&mut *resolver))?;
        lockfile.update(self.collaborators.package_manager)?;
        let updated = lockfile.normalize(self.fs.as_ref(), Some(resolver))?;

        if updated.fingerprint == current.fingerprint {
            info!("{} did not change", lockfile.path().display());
        }
        Ok(LockfileSchemaPair::new(current, updated))
    }

    fn apply_manifest_updates(&self, path: &Path, report: &ManifestReport) -> Result<Vec<AppliedUpdate>> {
        if report.schema.updated().is_empty() {
            return Ok(Vec::new());
        }

        let mut manifest = ManifestDocument::load(self.fs.as_ref(), path, self.settings)?;
        let mut applied = Vec::new();
        for (name, target) in report.schema.updated() {
            let old = manifest.constraint_for(name).map(String::from);
            if manifest.rewrite_constraint(self.fs.as_ref(), name, &target.constraint)? {
                applied.push(AppliedUpdate {
                    package: name.clone(),
                    old_constraint: old.unwrap_or_default(),
                    new_constraint: target.constraint.clone(),
                });
            } else {
                warn!("{} is not listed in {}", name, path.display());
            }
        }

        if !applied.is_empty() {
            if let Some(lockfile_path) = &report.lockfile_path {
                let lockfile = LockfileDocument::new(
                    lockfile_path.clone(),
                    self.fs.exists(lockfile_path)?,
                    ManifestSet::from_manifests(vec![manifest]),
                );
                if lockfile.existed() {
                    lockfile.generate(self.collaborators.package_manager)?;
                }
            }
        }

        Ok(applied)
    }

    fn check_working_tree(&self, expected: &BTreeSet<PathBuf>) -> Result<()> {
        let root = self.fs.project_root();
        let changed = self.collaborators.working_tree.changed_files(root)?;

        let unexpected: Vec<PathBuf> = changed
            .into_iter()
            .filter(|path| {
                let absolute = if path.is_absolute() { path.clone() } else { root.join(path) };
                !expected.contains(&absolute)
            })
            .collect();

        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(Error::DirtyWorkingTree(unexpected))
        }
    }
}

/// Errors that end the whole act run rather than one entry
fn is_fatal(error: &Error) -> bool {
    matches!(
        error,
        Error::ManifestWrite { .. } | Error::DirtyWorkingTree(_) | Error::CommandFailed { .. }
    )
}

/// Record `error` against `path`, or hand it back when it is fatal
fn skip_entry(failures: &mut Vec<ActFailure>, path: &Path, error: Error) -> Result<()> {
    if is_fatal(&error) {
        return Err(error);
    }
    warn!("Skipping {}: {}", path.display(), error);
    failures.push(ActFailure {
        path: path.to_path_buf(),
        reason: error.to_string(),
    });
    Ok(())
}

/// `^`/`~` of `constraint` applied to `version`, or the bare version
pub fn prefixed_constraint(constraint: &str, version: &str) -> String {
    if constraint.contains('^') {
        format!("^{}", version)
    } else if constraint.contains('~') {
        format!("~{}", version)
    } else {
        version.to_string()
    }
}

fn log_discovery_failures(manifests: &ManifestSet) {
    for failure in manifests.failures() {
        warn!("Workspace manifest {} was skipped: {}", failure.path.display(), failure.error);
    }
}
