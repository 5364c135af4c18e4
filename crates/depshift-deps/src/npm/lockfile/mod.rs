//! Lockfile normalization.
//!
//! Both npm lockfile families end up in the same [`NormalizedLockfile`]
//! shape. The concrete format is resolved once, when the lockfile is read, and
//! each format has its own [`FormatNormalizer`].

mod package_lock;
mod yarn;

pub use package_lock::{PackageLockV1Normalizer, PackageLockV3Normalizer};
pub use yarn::{parse_yarn_lock, YarnEntry, YarnLock, YarnLockNormalizer};

use super::workspace::ManifestSet;
use crate::checksum::fingerprint;
use crate::resolver::VersionResolver;
use crate::traits::{PackageManager, WorkspaceInfo};
use crate::types::{DependencyRecord, NormalizedLockfile, Source};
use crate::version::parse_version;
use crate::{Error, Result};
use depshift_config::Settings;
use depshift_fs::FileSystem;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// yarn v1 lockfile name
pub const YARN_LOCK: &str = "yarn.lock";
/// npm lockfile name
pub const PACKAGE_LOCK: &str = "package-lock.json";

const DEFAULT_REGISTRY_HOSTS: [&str; 2] = ["registry.npmjs.org", "registry.yarnpkg.com"];

/// Concrete lockfile format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockfileFormat {
    /// `yarn.lock` v1: flat map keyed by `name@range` composites
    FlatComposite,
    /// `package-lock.json` before v3: one nested `dependencies` tree
    NestedTreeV1,
    /// `package-lock.json` v3+: flat `packages` map keyed by install path
    NestedTreeV3,
}

impl LockfileFormat {
    /// Resolve the format from the file name and, for package-lock.json, the
    /// declared `lockfileVersion`.
    ///
    /// # Errors
    /// `UnsupportedLockfileFormat` for any other file name; `InvalidFormat`
    /// when a package-lock.json isn't a JSON object.
    pub fn detect(path: &Path, contents: &str) -> Result<Self> {
        match path.file_name().and_then(|n| n.to_str()) {
            Some(YARN_LOCK) => Ok(Self::FlatComposite),
            Some(PACKAGE_LOCK) => {
                let value: serde_json::Value = serde_json::from_str(contents)
                    .map_err(|e| Error::InvalidFormat(path.to_path_buf(), e.to_string()))?;
                let object = value.as_object().ok_or_else(|| {
                    Error::InvalidFormat(path.to_path_buf(), "expected a JSON object".to_string())
                })?;

                let version = object
                    .get("lockfileVersion")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(1);
                if version >= 3 && object.contains_key("packages") {
                    Ok(Self::NestedTreeV3)
                } else {
                    Ok(Self::NestedTreeV1)
                }
            }
            _ => Err(Error::UnsupportedLockfileFormat(path.to_path_buf())),
        }
    }

    fn normalizer(&self) -> &'static dyn FormatNormalizer {
        match self {
            Self::FlatComposite => &YarnLockNormalizer,
            Self::NestedTreeV1 => &PackageLockV1Normalizer,
            Self::NestedTreeV3 => &PackageLockV3Normalizer,
        }
    }
}

/// Turns one lockfile format into root-level dependency records
pub trait FormatNormalizer: Send + Sync {
    /// Normalize `contents` (read from `path`), classifying names as direct
    /// when `scope` has a root-level constraint for them.
    fn normalize(
        &self,
        path: &Path,
        contents: &str,
        scope: &ManifestSet,
    ) -> Result<BTreeMap<String, DependencyRecord>>;
}

/// Whether `name` is a lockfile this crate understands
pub fn is_lockfile_name(name: &str) -> bool {
    name == YARN_LOCK || name == PACKAGE_LOCK
}

/// Find the lockfile for `target`.
///
/// `target` may be a lockfile path or a directory, which is searched for
/// `yarn.lock` then `package-lock.json`. When neither exists the result points
/// at `yarn.lock` and reports that it did not exist.
pub fn locate_lockfile<F: FileSystem + ?Sized>(fs: &F, target: &Path) -> Result<(PathBuf, bool)> {
    if let Some(name) = target.file_name().and_then(|n| n.to_str()) {
        if is_lockfile_name(name) {
            return Ok((target.to_path_buf(), fs.exists(target)?));
        }
    }

    if !fs.is_dir(target)? {
        return Err(Error::UnsupportedLockfileFormat(target.to_path_buf()));
    }

    for name in [YARN_LOCK, PACKAGE_LOCK] {
        let candidate = target.join(name);
        if fs.exists(&candidate)? {
            return Ok((candidate, true));
        }
    }
    Ok((target.join(YARN_LOCK), false))
}

/// The source a lockfile entry was resolved from
pub fn source_from_resolved(resolved: Option<&str>) -> Source {
    let Some(resolved) = resolved.map(str::trim).filter(|r| !r.is_empty()) else {
        return Source::Registry;
    };

    match url::Url::parse(resolved) {
        Ok(url) if url.host_str().is_some_and(|h| DEFAULT_REGISTRY_HOSTS.contains(&h)) => {
            Source::Registry
        }
        _ => Source::Url(resolved.to_string()),
    }
}

/// A lockfile together with the manifests of its directory
#[derive(Debug)]
pub struct LockfileDocument {
    path: PathBuf,
    existed: bool,
    manifests: ManifestSet,
}

impl LockfileDocument {
    /// Locate the lockfile for `target` and load the manifests next to it.
    ///
    /// Manifests are loaded before the lockfile is ever read, so direct and
    /// transitive dependencies can be told apart during normalization.
    pub fn open<F: FileSystem + ?Sized>(
        fs: &F,
        target: &Path,
        settings: &Settings,
        workspace_info: &dyn WorkspaceInfo,
    ) -> Result<Self> {
        let (path, existed) = locate_lockfile(fs, target)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let manifests = ManifestSet::load(fs, &dir, settings, workspace_info)?;

        Ok(Self {
            path,
            existed,
            manifests,
        })
    }

    /// Build a document from parts
    pub fn new(path: PathBuf, existed: bool, manifests: ManifestSet) -> Self {
        Self {
            path,
            existed,
            manifests,
        }
    }

    /// Lockfile path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the lockfile
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Whether the lockfile existed when the document was opened
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Manifests of the lockfile's directory
    pub fn manifests(&self) -> &ManifestSet {
        &self.manifests
    }

    /// SHA-256 of the lockfile as it is on disk now
    pub fn fingerprint<F: FileSystem + ?Sized>(&self, fs: &F) -> Result<String> {
        Ok(fingerprint(&fs.read(&self.path)?))
    }

    /// Regenerate the lockfile from the manifests
    pub fn generate(&self, package_manager: &dyn PackageManager) -> Result<()> {
        info!("Regenerating {}", self.path.display());
        package_manager.generate_lockfile(&self.path)
    }

    /// Update dependencies within their ranges
    pub fn update(&self, package_manager: &dyn PackageManager) -> Result<()> {
        info!("Updating {}", self.path.display());
        package_manager.update_lockfile(&self.path)
    }

    /// Normalize the lockfile as it is on disk now.
    ///
    /// With a resolver, each root-level record also gets the versions above its
    /// installed one. A version-math failure there only leaves that record's
    /// list empty.
    pub fn normalize<F: FileSystem + ?Sized>(
        &self,
        fs: &F,
        resolver: Option<&mut VersionResolver<'_>>,
    ) -> Result<NormalizedLockfile> {
        let bytes = fs.read(&self.path)?;
        let contents = String::from_utf8(bytes)
            .map_err(|e| Error::InvalidFormat(self.path.clone(), e.to_string()))?;

        let format = LockfileFormat::detect(&self.path, &contents)?;
        debug!("Normalizing {} as {:?}", self.path.display(), format);
        let mut dependencies = format
            .normalizer()
            .normalize(&self.path, &contents, &self.manifests)?;

        if let Some(resolver) = resolver {
            for (name, record) in dependencies.iter_mut() {
                match available_above_installed(resolver, name, record) {
                    Ok(versions) => record.available_versions = versions,
                    Err(e) => warn!("Could not compute available versions for {}: {}", name, e),
                }
            }
        }

        Ok(NormalizedLockfile {
            dependencies,
            fingerprint: fingerprint(contents.as_bytes()),
        })
    }
}

fn available_above_installed(
    resolver: &mut VersionResolver<'_>,
    name: &str,
    record: &DependencyRecord,
) -> Result<Vec<String>> {
    let versions = resolver.available_versions(name, record.constraint.as_deref())?;

    let Some(installed) = record
        .installed_version
        .as_deref()
        .and_then(|v| parse_version(v).ok())
    else {
        return Ok(versions);
    };

    Ok(versions
        .into_iter()
        .filter(|v| parse_version(v).map(|parsed| parsed > installed).unwrap_or(false))
        .collect())
}
