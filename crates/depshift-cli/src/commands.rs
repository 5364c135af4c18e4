use crate::process::{GitWorkingTree, NpmInstalled, NpmRegistry, ProcessPackageManager, YarnWorkspaces};
use anyhow::{Context, Result};
use depshift_config::{ConfigManager, Settings};
use depshift_deps::{Collaborators, CollectReport, RangeLowerBoundUpdater, SchemaDiffBuilder};
use depshift_fs::{FileSystem, NativeFileSystem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Process-backed collaborators shared by every subcommand
struct ProcessCollaborators {
    registry: NpmRegistry,
    installed: NpmInstalled,
    package_manager: ProcessPackageManager,
    workspace_info: YarnWorkspaces,
    working_tree: GitWorkingTree,
}

impl ProcessCollaborators {
    fn new(root: &Path) -> Self {
        Self {
            registry: NpmRegistry::new(root),
            installed: NpmInstalled,
            package_manager: ProcessPackageManager,
            workspace_info: YarnWorkspaces,
            working_tree: GitWorkingTree,
        }
    }

    fn as_collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            registry: &self.registry,
            installed: &self.installed,
            package_manager: &self.package_manager,
            workspace_info: &self.workspace_info,
            working_tree: &self.working_tree,
        }
    }
}

/// Settings from `--config` or the project's `depshift.toml`, then the environment
pub fn load_settings(config: Option<&Path>, project_dir: &Path) -> Result<Settings> {
    let manager = match config {
        Some(path) => ConfigManager::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigManager::load_or_default(project_dir)
            .with_context(|| format!("Failed to load config in {}", project_dir.display()))?,
    };
    debug!("Using settings from {}", manager.config_path().display());

    let mut settings = manager.into_settings();
    settings
        .apply_process_env()
        .context("Failed to apply environment settings")?;
    Ok(settings)
}

/// Directory to root the filesystem at for a `collect` target
fn target_dir(target: &Path) -> PathBuf {
    if target.is_dir() {
        target.to_path_buf()
    } else {
        target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    }
}

/// Deepest directory containing every manifest in the report
pub fn common_root(report: &CollectReport) -> Option<PathBuf> {
    let mut dirs = report.manifests.keys().filter_map(|p| p.parent());
    let mut root = dirs.next()?.to_path_buf();
    for dir in dirs {
        while !dir.starts_with(&root) {
            root = root.parent()?.to_path_buf();
        }
    }
    Some(root)
}

fn write_report(report: &CollectReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote report to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn collect(target: &Path, output: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let dir = target_dir(target);
    let fs = Arc::new(
        NativeFileSystem::new(&dir).with_context(|| format!("Cannot open {}", dir.display()))?,
    );
    let root = fs.project_root().to_path_buf();
    let target = match target.file_name() {
        Some(name) if !target.is_dir() => root.join(name),
        _ => root.clone(),
    };

    let settings = load_settings(config, &root)?;
    let collaborators = ProcessCollaborators::new(&root);
    let builder = SchemaDiffBuilder::new(fs, &settings, collaborators.as_collaborators());

    let report = builder
        .collect(&target)
        .with_context(|| format!("Failed to collect {}", target.display()))?;
    write_report(&report, output)
}

pub fn act(input: &Path, output: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let report: CollectReport = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    let root = common_root(&report)
        .with_context(|| format!("{} lists no manifests", input.display()))?;
    let fs = Arc::new(
        NativeFileSystem::new(&root).with_context(|| format!("Cannot open {}", root.display()))?,
    );
    let settings = load_settings(config, fs.project_root())?;
    let collaborators = ProcessCollaborators::new(fs.project_root());
    let builder = SchemaDiffBuilder::new(fs, &settings, collaborators.as_collaborators());

    let outcome = builder.act(&report).context("Failed to apply updates")?;
    for update in &outcome.applied {
        info!(
            "{}: {} -> {}",
            update.package, update.old_constraint, update.new_constraint
        );
    }
    write_report(&outcome.report, output)
}

pub fn lower_bounds(dir: &Path, config: Option<&Path>) -> Result<()> {
    let fs = NativeFileSystem::new(dir).with_context(|| format!("Cannot open {}", dir.display()))?;
    let root = fs.project_root().to_path_buf();
    let settings = load_settings(config, &root)?;
    let collaborators = ProcessCollaborators::new(&root);

    let report = RangeLowerBoundUpdater::new(
        &fs,
        &settings,
        &collaborators.installed,
        &collaborators.package_manager,
    )
    .update_dir(&root)
    .with_context(|| format!("Failed to update lower bounds in {}", root.display()))?;

    if !report.has_changes() {
        println!("All ranges already start at the installed versions");
    }
    for update in &report.applied {
        println!(
            "{}: {} -> {}",
            update.package, update.old_constraint, update.new_constraint
        );
    }
    if report.lockfile_regenerated {
        println!("Lockfile regenerated");
    }
    Ok(())
}
