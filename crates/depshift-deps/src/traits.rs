//! Collaborator traits.
//!
//! The engine never talks to the network, spawns package managers or asks git
//! anything on its own. Those answers come from implementations of the traits
//! below; the CLI provides process-backed ones and tests provide fakes.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What the registry knows about a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersions {
    /// Every published version, in registry order (ascending)
    #[serde(default)]
    pub versions: Vec<String>,
    /// Distribution tags (tag -> version)
    #[serde(default, rename = "dist-tags")]
    pub dist_tags: BTreeMap<String, String>,
}

/// Source of published versions and distribution tags
pub trait RegistryClient: Send + Sync {
    /// Query the registry for `name`
    ///
    /// # Errors
    /// Returns an error when the registry cannot be reached or answers with
    /// something unparseable; callers treat that as "no data".
    fn package_versions(&self, name: &str) -> Result<PackageVersions>;
}

/// Reports which version of a package is installed in a project
pub trait InstalledVersions: Send + Sync {
    /// Installed version of `name` under `project_dir`, if any
    fn installed_version(&self, project_dir: &Path, name: &str) -> Result<Option<String>>;
}

/// Drives the package manager that owns a lockfile.
///
/// Implementations pick yarn or npm from the lockfile's file name.
pub trait PackageManager: Send + Sync {
    /// Install dependencies so that `lockfile` is (re)generated from the manifests
    fn generate_lockfile(&self, lockfile: &Path) -> Result<()>;

    /// Update dependencies within their ranges, rewriting `lockfile`
    fn update_lockfile(&self, lockfile: &Path) -> Result<()>;
}

/// Outcome of asking the package manager about workspaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceDiscovery {
    /// Manifest paths of every workspace package
    Found(Vec<PathBuf>),
    /// No workspace data; the reason is kept for logging
    Unavailable(String),
}

/// Workspace information for projects that don't declare workspace globs
pub trait WorkspaceInfo: Send + Sync {
    /// Discover workspace manifests below `root`
    fn workspace_manifests(&self, root: &Path) -> WorkspaceDiscovery;
}

/// Version-control view of the project directory
pub trait WorkingTree: Send + Sync {
    /// Files that differ from the last commit
    fn changed_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

/// A [`WorkspaceInfo`] that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWorkspaceInfo;

impl WorkspaceInfo for NoWorkspaceInfo {
    fn workspace_manifests(&self, _root: &Path) -> WorkspaceDiscovery {
        WorkspaceDiscovery::Unavailable("workspace discovery disabled".to_string())
    }
}
