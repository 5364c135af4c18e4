//! Workspace manifest discovery

use super::manifest::{ManifestDocument, MANIFEST_FILE_NAME};
use crate::traits::{WorkspaceDiscovery, WorkspaceInfo};
use crate::{Error, Result};
use depshift_config::Settings;
use depshift_fs::FileSystem;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A workspace manifest that could not be loaded
#[derive(Debug)]
pub struct DiscoveryFailure {
    /// Manifest path
    pub path: PathBuf,
    /// What went wrong
    pub error: Error,
}

/// The manifests of one project directory: the root manifest first, then
/// workspace manifests in path order.
///
/// Direct/transitive classification asks the manifests in that order, so the
/// root manifest's constraint wins when several manifests name a package.
#[derive(Debug)]
pub struct ManifestSet {
    manifests: Vec<ManifestDocument>,
    failures: Vec<DiscoveryFailure>,
}

impl ManifestSet {
    /// Load the manifest in `dir` plus every workspace manifest it declares.
    ///
    /// # Errors
    /// Fails only when the root manifest itself can't be loaded; broken
    /// workspace manifests are collected in [`failures`](Self::failures).
    pub fn load<F: FileSystem + ?Sized>(
        fs: &F,
        dir: &Path,
        settings: &Settings,
        workspace_info: &dyn WorkspaceInfo,
    ) -> Result<Self> {
        let root = ManifestDocument::load(fs, dir, settings)?;
        let (workspaces, failures) = discover_workspace_manifests(fs, &root, settings, workspace_info)?;

        let mut manifests = Vec::with_capacity(workspaces.len() + 1);
        manifests.push(root);
        manifests.extend(workspaces);
        Ok(Self {
            manifests,
            failures,
        })
    }

    /// Wrap already-loaded manifests, root first
    pub fn from_manifests(manifests: Vec<ManifestDocument>) -> Self {
        Self {
            manifests,
            failures: Vec::new(),
        }
    }

    /// The root manifest
    pub fn root(&self) -> Option<&ManifestDocument> {
        self.manifests.first()
    }

    /// Every loaded manifest, root first
    pub fn manifests(&self) -> &[ManifestDocument] {
        &self.manifests
    }

    /// Workspace manifests that failed to load
    pub fn failures(&self) -> &[DiscoveryFailure] {
        &self.failures
    }

    /// Root-level constraint for `name` across all manifests
    pub fn constraint_for(&self, name: &str) -> Option<&str> {
        self.manifests.iter().find_map(|m| m.constraint_for(name))
    }
}

/// Find and parse the workspace manifests below `root`.
///
/// Glob patterns from the `workspaces` field are used when present; otherwise
/// the [`WorkspaceInfo`] collaborator is asked. Each manifest is parsed on its
/// own, and a broken one is reported without affecting its siblings.
pub fn discover_workspace_manifests<F: FileSystem + ?Sized>(
    fs: &F,
    root: &ManifestDocument,
    settings: &Settings,
    workspace_info: &dyn WorkspaceInfo,
) -> Result<(Vec<ManifestDocument>, Vec<DiscoveryFailure>)> {
    let root_dir = root.dir();
    let patterns = root.workspace_patterns();

    let mut paths = BTreeSet::new();
    if patterns.is_empty() {
        match workspace_info.workspace_manifests(root_dir) {
            WorkspaceDiscovery::Found(found) => {
                for path in found {
                    let path = if path.is_absolute() { path } else { root_dir.join(path) };
                    paths.insert(manifest_path(fs, &path)?);
                }
            }
            WorkspaceDiscovery::Unavailable(reason) => {
                debug!("No workspace information for {}: {}", root_dir.display(), reason);
            }
        }
    } else {
        for pattern in patterns {
            if pattern.starts_with('!') {
                debug!("Ignoring negated workspace pattern {}", pattern);
                continue;
            }
            let full = root_dir.join(&pattern).join(MANIFEST_FILE_NAME);
            let matches = fs
                .glob(&full.to_string_lossy())
                .map_err(|e| Error::WorkspaceError(format!("Invalid workspace pattern {}: {}", pattern, e)))?;
            paths.extend(matches);
        }
    }
    paths.remove(root.path());

    let mut manifests = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match ManifestDocument::load(fs, &path, settings) {
            Ok(manifest) => manifests.push(manifest),
            Err(error) => {
                warn!("Skipping workspace manifest {}: {}", path.display(), error);
                failures.push(DiscoveryFailure { path, error });
            }
        }
    }

    Ok((manifests, failures))
}

fn manifest_path<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<PathBuf> {
    if path.file_name().is_some_and(|n| n == MANIFEST_FILE_NAME) || !fs.is_dir(path)? {
        Ok(path.to_path_buf())
    } else {
        Ok(path.join(MANIFEST_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NoWorkspaceInfo;
    use depshift_fs::MemoryFileSystem;

    struct FixedWorkspaces(Vec<PathBuf>);

    impl WorkspaceInfo for FixedWorkspaces {
        fn workspace_manifests(&self, _root: &Path) -> WorkspaceDiscovery {
            WorkspaceDiscovery::Found(self.0.clone())
        }
    }

    fn project() -> MemoryFileSystem {
        MemoryFileSystem::new("/repo")
            .unwrap()
            .with_file(
                "package.json",
                r#"{"workspaces": ["packages/*"], "dependencies": {"shared": "^1.0.0"}}"#,
            )
            .unwrap()
            .with_file("packages/b/package.json", r#"{"dependencies": {"shared": "^2.0.0", "b-only": "~1.0.0"}}"#)
            .unwrap()
            .with_file("packages/a/package.json", r#"{"dependencies": {"a-only": "1.0.0"}}"#)
            .unwrap()
            .with_file("packages/broken/package.json", "{ nope")
            .unwrap()
    }

    #[test]
    fn test_glob_discovery_keeps_going_past_failures() {
        let fs = project();
        let set = ManifestSet::load(&fs, Path::new("/repo"), &Settings::default(), &NoWorkspaceInfo).unwrap();

        let paths: Vec<_> = set.manifests().iter().map(|m| m.path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/repo/package.json"),
                PathBuf::from("/repo/packages/a/package.json"),
                PathBuf::from("/repo/packages/b/package.json"),
            ]
        );
        assert_eq!(set.failures().len(), 1);
        assert!(matches!(set.failures()[0].error, Error::MalformedManifest { .. }));
    }

    #[test]
    fn test_root_constraint_wins() {
        let fs = project();
        let set = ManifestSet::load(&fs, Path::new("/repo"), &Settings::default(), &NoWorkspaceInfo).unwrap();

        assert_eq!(set.constraint_for("shared"), Some("^1.0.0"));
        assert_eq!(set.constraint_for("b-only"), Some("~1.0.0"));
        assert_eq!(set.constraint_for("nothing"), None);
    }

    #[test]
    fn test_collaborator_discovery() {
        let fs = MemoryFileSystem::new("/repo")
            .unwrap()
            .with_file("package.json", r#"{"dependencies": {}}"#)
            .unwrap()
            .with_file("apps/web/package.json", r#"{"dependencies": {"react": "^18.0.0"}}"#)
            .unwrap();
        let info = FixedWorkspaces(vec![PathBuf::from("apps/web")]);

        let set = ManifestSet::load(&fs, Path::new("/repo"), &Settings::default(), &info).unwrap();
        assert_eq!(set.manifests().len(), 2);
        assert_eq!(set.constraint_for("react"), Some("^18.0.0"));
    }

    #[test]
    fn test_broken_root_is_an_error() {
        let fs = MemoryFileSystem::new("/repo")
            .unwrap()
            .with_file("package.json", "not json")
            .unwrap();
        let result = ManifestSet::load(&fs, Path::new("/repo"), &Settings::default(), &NoWorkspaceInfo);
        assert!(matches!(result, Err(Error::MalformedManifest { .. })));
    }
}
