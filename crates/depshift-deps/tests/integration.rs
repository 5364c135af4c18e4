//! Integration tests for depshift-deps
//!
//! These run the collect and act flows end to end against an in-memory project
//! with scripted collaborators.

use depshift_config::Settings;
use depshift_deps::npm::{LockfileDocument, ManifestDocument};
use depshift_deps::traits::NoWorkspaceInfo;
use depshift_deps::{
    Collaborators, CollectReport, DependencySummary, Error, InstalledVersions, ManifestReport,
    PackageManager, PackageVersions, RegistryClient, Result, SchemaDiffBuilder, SchemaPair,
    Source, VersionCache, VersionResolver, WorkingTree,
};
use depshift_fs::{FileSystem, MemoryFileSystem, NativeFileSystem};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const MANIFEST: &str = r#"{
  "name": "app",
  "dependencies": {
    "a": "^1.0.0"
  },
  "devDependencies": {
    "b": "~2.0.0"
  }
}
"#;

const YARN_LOCK: &str = r#"# yarn lockfile v1


a@^1.0.0:
  version "1.0.0"
  resolved "https://registry.yarnpkg.com/a/-/a-1.0.0.tgz"

b@~2.0.0:
  version "2.0.0"
  resolved "https://registry.yarnpkg.com/b/-/b-2.0.0.tgz"
  dependencies:
    c "^1.0.0"

c@^1.0.0:
  version "1.0.0"
  resolved "https://registry.yarnpkg.com/c/-/c-1.0.0.tgz"
"#;

const UPDATED_YARN_LOCK: &str = r#"# yarn lockfile v1


a@^1.0.0:
  version "1.1.0"
  resolved "https://registry.yarnpkg.com/a/-/a-1.1.0.tgz"

b@~2.0.0:
  version "2.0.0"
  resolved "https://registry.yarnpkg.com/b/-/b-2.0.0.tgz"
  dependencies:
    c "^1.0.0"

c@^1.0.0:
  version "1.2.0"
  resolved "https://registry.yarnpkg.com/c/-/c-1.2.0.tgz"
"#;

struct FakeRegistry {
    data: BTreeMap<String, PackageVersions>,
    calls: Mutex<BTreeMap<String, usize>>,
}

impl FakeRegistry {
    fn new() -> Self {
        let mut data = BTreeMap::new();
        for (name, versions, latest) in [
            ("a", vec!["1.0.0", "1.1.0", "2.0.0"], "1.1.0"),
            ("b", vec!["2.0.0", "2.0.1", "3.0.0"], "3.0.0"),
            ("c", vec!["1.0.0", "1.2.0"], "1.2.0"),
        ] {
            data.insert(
                name.to_string(),
                PackageVersions {
                    versions: versions.into_iter().map(String::from).collect(),
                    dist_tags: BTreeMap::from([("latest".to_string(), latest.to_string())]),
                },
            );
        }
        Self {
            data,
            calls: Mutex::new(BTreeMap::new()),
        }
    }
}

impl RegistryClient for FakeRegistry {
    fn package_versions(&self, name: &str) -> Result<PackageVersions> {
        *self.calls.lock().entry(name.to_string()).or_default() += 1;
        self.data.get(name).cloned().ok_or_else(|| Error::RegistryQueryFailed {
            name: name.to_string(),
            reason: "404".to_string(),
        })
    }
}

struct FakeInstalled(BTreeMap<&'static str, &'static str>);

impl InstalledVersions for FakeInstalled {
    fn installed_version(&self, _dir: &Path, name: &str) -> Result<Option<String>> {
        Ok(self.0.get(name).map(|v| v.to_string()))
    }
}

/// Writes a scripted lockfile on update and records every call
struct ScriptedPackageManager {
    fs: MemoryFileSystem,
    updated_lockfile: Option<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl PackageManager for ScriptedPackageManager {
    fn generate_lockfile(&self, lockfile: &Path) -> Result<()> {
        self.calls.lock().push(format!("generate {}", lockfile.display()));
        Ok(())
    }

    fn update_lockfile(&self, lockfile: &Path) -> Result<()> {
        self.calls.lock().push(format!("update {}", lockfile.display()));
        if let Some(contents) = self.updated_lockfile {
            self.fs.insert(lockfile, contents.as_bytes().to_vec())?;
        }
        Ok(())
    }
}

struct FakeWorkingTree(Vec<PathBuf>);

impl WorkingTree for FakeWorkingTree {
    fn changed_files(&self, _root: &Path) -> Result<Vec<PathBuf>> {
        Ok(self.0.clone())
    }
}

fn project() -> MemoryFileSystem {
    MemoryFileSystem::new("/repo")
        .unwrap()
        .with_file("package.json", MANIFEST)
        .unwrap()
        .with_file("yarn.lock", YARN_LOCK)
        .unwrap()
}

fn installed() -> FakeInstalled {
    FakeInstalled(BTreeMap::from([("a", "1.0.0"), ("b", "2.0.0")]))
}

/// Versions present once the updated lockfile has been installed
fn installed_after_update() -> FakeInstalled {
    FakeInstalled(BTreeMap::from([("a", "1.1.0"), ("b", "3.0.0")]))
}

#[test]
fn test_collect_end_to_end() {
    let fs = project();
    let settings = Settings::default();
    let registry = FakeRegistry::new();
    let installed = installed();
    let package_manager = ScriptedPackageManager {
        fs: fs.clone(),
        updated_lockfile: Some(UPDATED_YARN_LOCK),
        calls: Mutex::new(Vec::new()),
    };
    let working_tree = FakeWorkingTree(Vec::new());

    let builder = SchemaDiffBuilder::new(
        Arc::new(fs.clone()),
        &settings,
        Collaborators {
            registry: &registry,
            installed: &installed,
            package_manager: &package_manager,
            workspace_info: &NoWorkspaceInfo,
            working_tree: &working_tree,
        },
    );
    let report = builder.collect(Path::new("/repo")).unwrap();

    // manifest side
    let manifest = &report.manifests[Path::new("/repo/package.json")];
    assert_eq!(manifest.lockfile_path.as_deref(), Some(Path::new("/repo/yarn.lock")));

    let a = &manifest.schema.current()["a"];
    assert_eq!(a.constraint, "^1.0.0");
    assert_eq!(a.source, Source::Registry);
    assert_eq!(a.installed.as_deref(), Some("1.0.0"));
    assert_eq!(a.available, vec!["1.1.0"]);

    // 1.1.0 is still inside ^1.0.0, only b needs a new constraint
    assert_eq!(manifest.schema.updated().keys().collect::<Vec<_>>(), vec!["b"]);
    assert_eq!(manifest.schema.updated()["b"].constraint, "~3.0.0");

    // lockfile side
    let pair = &report.lockfiles[Path::new("/repo/yarn.lock")];
    let current_a = pair.current.get("a").unwrap();
    assert!(!current_a.is_transitive);
    assert_eq!(current_a.installed_version.as_deref(), Some("1.0.0"));
    assert_eq!(current_a.available_versions, vec!["1.1.0"]);

    let current_c = pair.current.get("c").unwrap();
    assert!(current_c.is_transitive);
    assert_eq!(current_c.available_versions, vec!["1.2.0"]);

    let updated = pair.updated.as_ref().expect("lockfile changed");
    assert_ne!(updated.fingerprint, pair.current.fingerprint);
    assert_eq!(updated.get("a").unwrap().installed_version.as_deref(), Some("1.1.0"));
    assert!(updated.get("a").unwrap().available_versions.is_empty());

    // installed versions never show up as available
    for snapshot in [&pair.current, updated] {
        for record in snapshot.dependencies.values() {
            if let Some(installed) = &record.installed_version {
                assert!(!record.available_versions.contains(installed));
            }
        }
    }

    // one registry query per name across the whole run
    assert!(registry.calls.lock().values().all(|count| *count == 1));
    assert_eq!(*package_manager.calls.lock(), vec!["update /repo/yarn.lock".to_string()]);
}

#[test]
fn test_collect_unchanged_lockfile_has_no_update() {
    let fs = project();
    let settings = Settings::default();
    let registry = FakeRegistry::new();
    let installed = installed();
    let package_manager = ScriptedPackageManager {
        fs: fs.clone(),
        updated_lockfile: None,
        calls: Mutex::new(Vec::new()),
    };
    let working_tree = FakeWorkingTree(Vec::new());

    let builder = SchemaDiffBuilder::new(
        Arc::new(fs),
        &settings,
        Collaborators {
            registry: &registry,
            installed: &installed,
            package_manager: &package_manager,
            workspace_info: &NoWorkspaceInfo,
            working_tree: &working_tree,
        },
    );
    let report = builder.collect(Path::new("/repo")).unwrap();

    assert!(report.lockfiles[Path::new("/repo/yarn.lock")].updated.is_none());
}

#[test]
fn test_collect_without_lockfile() {
    let fs = MemoryFileSystem::new("/repo")
        .unwrap()
        .with_file("package.json", MANIFEST)
        .unwrap();
    let settings = Settings::default();
    let registry = FakeRegistry::new();
    let installed = installed();
    let package_manager = ScriptedPackageManager {
        fs: fs.clone(),
        updated_lockfile: None,
        calls: Mutex::new(Vec::new()),
    };
    let working_tree = FakeWorkingTree(Vec::new());

    let builder = SchemaDiffBuilder::new(
        Arc::new(fs),
        &settings,
        Collaborators {
            registry: &registry,
            installed: &installed,
            package_manager: &package_manager,
            workspace_info: &NoWorkspaceInfo,
            working_tree: &working_tree,
        },
    );
    let report = builder.collect(Path::new("/repo")).unwrap();

    assert!(report.lockfiles.is_empty());
    assert!(report.manifests[Path::new("/repo/package.json")].lockfile_path.is_none());
    assert!(package_manager.calls.lock().is_empty());

    // the report's JSON omits the lockfiles key entirely
    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("lockfiles").is_none());
}

#[test]
fn test_act_applies_updates_and_checks_working_tree() {
    let fs = project();
    let mut settings = Settings::default();
    let registry = FakeRegistry::new();
    let installed = installed_after_update();
    let package_manager = ScriptedPackageManager {
        fs: fs.clone(),
        updated_lockfile: Some(UPDATED_YARN_LOCK),
        calls: Mutex::new(Vec::new()),
    };
    let working_tree = FakeWorkingTree(vec![PathBuf::from("package.json"), PathBuf::from("yarn.lock")]);
    let collaborators = Collaborators {
        registry: &registry,
        installed: &installed,
        package_manager: &package_manager,
        workspace_info: &NoWorkspaceInfo,
        working_tree: &working_tree,
    };

    let input = SchemaDiffBuilder::new(Arc::new(fs.clone()), &settings, collaborators)
        .collect(Path::new("/repo"))
        .unwrap();
    // act starts from the original lockfile again
    fs.insert(Path::new("/repo/yarn.lock"), YARN_LOCK.as_bytes().to_vec()).unwrap();
    package_manager.calls.lock().clear();

    settings.update_lower_bounds = true;
    let outcome = SchemaDiffBuilder::new(Arc::new(fs.clone()), &settings, collaborators)
        .act(&input)
        .unwrap();

    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].package, "b");
    assert_eq!(outcome.applied[0].old_constraint, "~2.0.0");
    assert_eq!(outcome.applied[0].new_constraint, "~3.0.0");

    let manifest = ManifestDocument::load(&fs, Path::new("/repo"), &settings).unwrap();
    assert_eq!(manifest.constraint_for("b"), Some("~3.0.0"));
    // the lower-bound pass moves a up to what the update installed
    assert_eq!(manifest.constraint_for("a"), Some("^1.1.0"));

    let written = fs.read_to_string(Path::new("/repo/package.json")).unwrap();
    assert!(written.starts_with("{\n  \"name\": \"app\""));
    assert!(written.ends_with("}\n"));

    let calls = package_manager.calls.lock().clone();
    assert_eq!(
        calls,
        vec![
            "generate /repo/yarn.lock".to_string(),
            "update /repo/yarn.lock".to_string(),
            "generate /repo/yarn.lock".to_string(),
        ]
    );

    let refreshed = outcome.report.lockfiles[Path::new("/repo/yarn.lock")]
        .updated
        .as_ref()
        .unwrap();
    assert_eq!(refreshed.get("a").unwrap().installed_version.as_deref(), Some("1.1.0"));
    let lower = &outcome.lower_bounds[Path::new("/repo")];
    assert_eq!(lower.applied.len(), 1);
    assert_eq!(lower.applied[0].package, "a");
    assert_eq!(lower.applied[0].new_constraint, "^1.1.0");
    assert!(lower.lockfile_regenerated);
    assert!(outcome.failures.is_empty());
}

#[test]
fn test_act_skips_malformed_manifest() {
    let fs = MemoryFileSystem::new("/r")
        .unwrap()
        .with_file("bad/package.json", "{ not json")
        .unwrap()
        .with_file("good/package.json", "{\"dependencies\":{\"a\":\"^1.0.0\"}}")
        .unwrap();
    let settings = Settings::default();
    let registry = FakeRegistry::new();
    let installed = installed();
    let package_manager = ScriptedPackageManager {
        fs: fs.clone(),
        updated_lockfile: None,
        calls: Mutex::new(Vec::new()),
    };
    let working_tree = FakeWorkingTree(vec![PathBuf::from("good/package.json")]);

    let summary = |constraint: &str| DependencySummary {
        constraint: constraint.to_string(),
        source: Source::Registry,
        installed: None,
        available: Vec::new(),
    };
    let mut input = CollectReport::default();
    for path in ["/r/bad/package.json", "/r/good/package.json"] {
        let mut schema = SchemaPair::new();
        schema.insert_current("a", summary("^1.0.0"));
        schema.insert_updated("a", summary("^2.0.0")).unwrap();
        input.manifests.insert(
            PathBuf::from(path),
            ManifestReport {
                schema,
                lockfile_path: None,
            },
        );
    }

    let builder = SchemaDiffBuilder::new(
        Arc::new(fs.clone()),
        &settings,
        Collaborators {
            registry: &registry,
            installed: &installed,
            package_manager: &package_manager,
            workspace_info: &NoWorkspaceInfo,
            working_tree: &working_tree,
        },
    );
    let outcome = builder.act(&input).unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].path, PathBuf::from("/r/bad/package.json"));
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.applied[0].new_constraint, "^2.0.0");

    let good = ManifestDocument::load(&fs, Path::new("/r/good"), &settings).unwrap();
    assert_eq!(good.constraint_for("a"), Some("^2.0.0"));
    assert_eq!(fs.read_to_string(Path::new("/r/bad/package.json")).unwrap(), "{ not json");
}

#[test]
fn test_act_rejects_unexpected_changes() {
    let fs = project();
    let settings = Settings::default();
    let registry = FakeRegistry::new();
    let installed = installed();
    let package_manager = ScriptedPackageManager {
        fs: fs.clone(),
        updated_lockfile: None,
        calls: Mutex::new(Vec::new()),
    };
    let working_tree = FakeWorkingTree(vec![
        PathBuf::from("yarn.lock"),
        PathBuf::from("scripts/postinstall.js"),
    ]);
    let collaborators = Collaborators {
        registry: &registry,
        installed: &installed,
        package_manager: &package_manager,
        workspace_info: &NoWorkspaceInfo,
        working_tree: &working_tree,
    };
    let builder = SchemaDiffBuilder::new(Arc::new(fs), &settings, collaborators);

    let input = builder.collect(Path::new("/repo")).unwrap();
    match builder.act(&input) {
        Err(Error::DirtyWorkingTree(paths)) => {
            assert_eq!(paths, vec![PathBuf::from("scripts/postinstall.js")]);
        }
        other => panic!("expected a dirty working tree, got {:?}", other.map(|o| o.applied)),
    }
}

#[test]
fn test_resolver_example_from_registry() {
    let registry = FakeRegistry::new();
    let mut cache = VersionCache::new();
    let settings = Settings::default();
    let mut resolver = VersionResolver::new(&registry, &mut cache, &settings.registry);

    assert_eq!(resolver.available_versions("a", Some("^1.0.0")).unwrap(), vec!["1.1.0"]);
}

#[test]
fn test_native_package_lock_v3() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("package.json"),
        "{\n\t\"dependencies\": {\n\t\t\"x\": \"^1.0.0\"\n\t}\n}\n",
    )
    .unwrap();
    std::fs::write(
        temp_dir.path().join("package-lock.json"),
        r#"{
  "name": "demo",
  "lockfileVersion": 3,
  "packages": {
    "": {"dependencies": {"x": "^1.0.0"}},
    "node_modules/x": {"version": "1.0.0", "resolved": "https://registry.npmjs.org/x/-/x-1.0.0.tgz"},
    "node_modules/x/node_modules/y": {"version": "2.0.0"}
  }
}"#,
    )
    .unwrap();

    let fs = NativeFileSystem::new(temp_dir.path()).unwrap();
    let root = fs.project_root().to_path_buf();
    let settings = Settings::default();
    let lockfile = LockfileDocument::open(&fs, &root, &settings, &NoWorkspaceInfo).unwrap();

    assert!(lockfile.existed());
    assert_eq!(lockfile.path(), root.join("package-lock.json"));

    let normalized = lockfile.normalize(&fs, None).unwrap();
    assert_eq!(normalized.dependencies.len(), 1);
    assert!(normalized.get("x").unwrap().is_direct());
    assert_eq!(normalized.fingerprint.len(), 64);

    // tab indentation survives a rewrite on disk
    let mut manifest = ManifestDocument::load(&fs, &root, &settings).unwrap();
    manifest.rewrite_constraint(&fs, "x", "^1.0.1").unwrap();
    assert_eq!(
        std::fs::read_to_string(root.join("package.json")).unwrap(),
        "{\n\t\"dependencies\": {\n\t\t\"x\": \"^1.0.1\"\n\t}\n}\n"
    );
}

#[test]
fn test_unsupported_lockfile_path() {
    let fs = project();
    let result = LockfileDocument::open(
        &fs,
        Path::new("/repo/pnpm-lock.yaml"),
        &Settings::default(),
        &NoWorkspaceInfo,
    );
    assert!(matches!(result, Err(Error::UnsupportedLockfileFormat(_))));
}
