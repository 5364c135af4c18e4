//! Collaborators backed by `npm`, `yarn` and `git` processes.

use depshift_deps::npm::{MANIFEST_FILE_NAME, PACKAGE_LOCK, YARN_LOCK};
use depshift_deps::{
    Error, InstalledVersions, PackageManager, PackageVersions, RegistryClient, Result, WorkingTree,
    WorkspaceDiscovery, WorkspaceInfo,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ")
}

/// Run `program` in `cwd` and return its output whatever the exit status
fn run(program: &str, args: &[&str], cwd: &Path) -> Result<Output> {
    debug!("Running `{}` in {}", command_line(program, args), cwd.display());
    Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| Error::CommandFailed {
            command: command_line(program, args),
            reason: e.to_string(),
        })
}

/// Run `program` in `cwd`, failing on a non-zero exit
fn run_checked(program: &str, args: &[&str], cwd: &Path) -> Result<String> {
    let output = run(program, args, cwd)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::CommandFailed {
            command: command_line(program, args),
            reason: format!("{}: {}", output.status, stderr.trim()),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Registry data through `npm view`
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    cwd: PathBuf,
}

impl NpmRegistry {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

impl RegistryClient for NpmRegistry {
    fn package_versions(&self, name: &str) -> Result<PackageVersions> {
        let stdout = run_checked("npm", &["view", name, "versions", "dist-tags", "--json"], &self.cwd)
            .map_err(|e| Error::RegistryQueryFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        parse_registry_output(&stdout).map_err(|reason| Error::RegistryQueryFailed {
            name: name.to_string(),
            reason,
        })
    }
}

/// `npm view` prints `versions` as a bare string when only one exists.
pub(crate) fn parse_registry_output(stdout: &str) -> std::result::Result<PackageVersions, String> {
    let mut value: Value = serde_json::from_str(stdout).map_err(|e| e.to_string())?;
    if let Some(Value::String(single)) = value.get("versions").cloned() {
        value["versions"] = Value::Array(vec![Value::String(single)]);
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Installed versions through `npm ls`
#[derive(Debug, Clone, Copy, Default)]
pub struct NpmInstalled;

impl InstalledVersions for NpmInstalled {
    fn installed_version(&self, project_dir: &Path, name: &str) -> Result<Option<String>> {
        // npm ls exits non-zero for extraneous or missing packages but still
        // prints the tree
        let output = run("npm", &["ls", name, "--depth=0", "--json"], project_dir)?;
        Ok(parse_installed_output(&String::from_utf8_lossy(&output.stdout), name))
    }
}

pub(crate) fn parse_installed_output(stdout: &str, name: &str) -> Option<String> {
    let value: Value = serde_json::from_str(stdout.trim()).ok()?;
    value
        .get("dependencies")?
        .get(name)?
        .get("version")?
        .as_str()
        .map(String::from)
}

/// Workspace manifests through `yarn workspaces info`
#[derive(Debug, Clone, Copy, Default)]
pub struct YarnWorkspaces;

impl WorkspaceInfo for YarnWorkspaces {
    fn workspace_manifests(&self, root: &Path) -> WorkspaceDiscovery {
        match run_checked("yarn", &["workspaces", "info", "--json"], root) {
            Ok(stdout) => match parse_workspaces_output(&stdout) {
                Ok(locations) => WorkspaceDiscovery::Found(
                    locations
                        .into_iter()
                        .map(|location| root.join(location).join(MANIFEST_FILE_NAME))
                        .collect(),
                ),
                Err(reason) => WorkspaceDiscovery::Unavailable(reason),
            },
            Err(e) => WorkspaceDiscovery::Unavailable(e.to_string()),
        }
    }
}

/// Workspace locations from yarn's `{"type": "log", "data": "<json>"}` wrapper
pub(crate) fn parse_workspaces_output(stdout: &str) -> std::result::Result<Vec<String>, String> {
    let outer: Value = serde_json::from_str(stdout).map_err(|e| e.to_string())?;
    let data = outer
        .get("data")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing data field".to_string())?;
    let workspaces: serde_json::Map<String, Value> =
        serde_json::from_str(data).map_err(|e| e.to_string())?;

    Ok(workspaces
        .values()
        .filter_map(|ws| ws.get("location").and_then(Value::as_str))
        .map(String::from)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockfileAction {
    Generate,
    Update,
}

/// Program and arguments for `action` on `lockfile`, chosen by its file name
pub(crate) fn lockfile_command(
    lockfile: &Path,
    action: LockfileAction,
) -> Result<(&'static str, &'static [&'static str])> {
    let name = lockfile.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let command: (&'static str, &'static [&'static str]) = match (name, action) {
        (YARN_LOCK, LockfileAction::Generate) => (
            "yarn",
            &["install", "--ignore-scripts", "--ignore-engines", "--ignore-platform"],
        ),
        (YARN_LOCK, LockfileAction::Update) => (
            "yarn",
            &["upgrade", "--ignore-scripts", "--ignore-engines", "--ignore-platform"],
        ),
        (PACKAGE_LOCK, LockfileAction::Generate) => ("npm", &["install", "--ignore-scripts", "--quiet"]),
        (PACKAGE_LOCK, LockfileAction::Update) => ("npm", &["update", "--ignore-scripts", "--quiet"]),
        _ => return Err(Error::UnsupportedLockfileFormat(lockfile.to_path_buf())),
    };
    Ok(command)
}

/// Runs yarn or npm next to the lockfile
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessPackageManager;

impl ProcessPackageManager {
    fn execute(&self, lockfile: &Path, action: LockfileAction) -> Result<()> {
        let (program, args) = lockfile_command(lockfile, action)?;
        let dir = lockfile.parent().unwrap_or_else(|| Path::new("."));
        run_checked(program, args, dir).map(|_| ())
    }
}

impl PackageManager for ProcessPackageManager {
    fn generate_lockfile(&self, lockfile: &Path) -> Result<()> {
        self.execute(lockfile, LockfileAction::Generate)
    }

    fn update_lockfile(&self, lockfile: &Path) -> Result<()> {
        self.execute(lockfile, LockfileAction::Update)
    }
}

/// Changed files through `git status`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitWorkingTree;

impl WorkingTree for GitWorkingTree {
    fn changed_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let toplevel = match run_checked("git", &["rev-parse", "--show-toplevel"], root) {
            Ok(path) => PathBuf::from(path.trim()),
            Err(e) => {
                warn!("{} is not inside a git repository: {}", root.display(), e);
                return Ok(Vec::new());
            }
        };
        // porcelain paths stay relative to the toplevel even with a pathspec
        let status = run_checked(
            "git",
            &["status", "--porcelain", "--untracked-files=all", "--", "."],
            root,
        )?;
        Ok(parse_porcelain(&status)
            .into_iter()
            .map(|path| toplevel.join(path))
            .collect())
    }
}

/// Paths from `git status --porcelain`, relative to the repository root
pub(crate) fn parse_porcelain(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            // renames are listed as "old -> new"
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            PathBuf::from(path.trim_matches('"'))
        })
        .collect()
}
