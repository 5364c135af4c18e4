//! # depshift-deps
//!
//! Dependency schema normalization and constraint rewriting for npm and yarn
//! projects.
//!
//! This crate provides functionality to:
//! - Parse `yarn.lock` (v1) and `package-lock.json` (v1 through v3) into one
//!   dependency graph, telling direct dependencies from transitive ones
//! - Compute the versions a dependency could move to, capped by distribution tags
//! - Rewrite package.json constraints while keeping indentation and `^`/`~` style
//! - Raise range lower bounds to the installed versions
//! - Build the `{current, updated}` schema pairs for manifests and lockfiles
//!
//! ## Architecture
//!
//! Everything outside the process boundary (registry, package manager, git)
//! is reached through the collaborator traits in [`traits`]; files go through
//! [`depshift_fs::FileSystem`]. The engine itself is synchronous.
//!
//! ## Example
//!
//! ```rust,no_run
//! use depshift_config::Settings;
//! use depshift_deps::npm::LockfileDocument;
//! use depshift_deps::traits::NoWorkspaceInfo;
//! use depshift_fs::NativeFileSystem;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let fs = NativeFileSystem::new(".")?;
//! let settings = Settings::default();
//! let lockfile = LockfileDocument::open(&fs, Path::new("."), &settings, &NoWorkspaceInfo)?;
//!
//! for (name, record) in lockfile.normalize(&fs, None)?.dependencies {
//!     println!("{}: {:?} (transitive: {})", name, record.installed_version, record.is_transitive);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod checksum;
pub mod error;
pub mod npm;
pub mod range;
pub mod resolver;
pub mod schema;
pub mod traits;
pub mod types;
pub mod update;
pub mod version;

// Re-export main types and traits
pub use error::{Error, Result};
pub use traits::{
    InstalledVersions, PackageManager, PackageVersions, RegistryClient, WorkingTree,
    WorkspaceDiscovery, WorkspaceInfo,
};
pub use types::{
    AppliedUpdate, ChildDependency, DependencyRecord, DependencySummary, NormalizedLockfile,
    Relationship, Source,
};

// Re-export the engine components
pub use npm::{LockfileDocument, LockfileFormat, ManifestDocument, ManifestSet};
pub use range::rewrite_lower_bound;
pub use resolver::{RegistryFailure, VersionCache, VersionResolver};
pub use schema::{
    ActFailure, ActOutcome, CollectReport, Collaborators, LockfileSchemaPair, ManifestReport, SchemaDiffBuilder,
    SchemaPair,
};
pub use update::{LowerBoundReport, RangeLowerBoundUpdater};

// Re-export version utilities
pub use version::{
    compare_versions, greater_than_range, is_valid_range, less_or_equal, satisfies, update_type,
    UpdateType,
};
