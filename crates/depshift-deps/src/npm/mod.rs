//! npm and yarn support: manifests, workspaces and lockfiles

pub mod lockfile;
pub mod manifest;
pub mod workspace;

pub use lockfile::{
    locate_lockfile, FormatNormalizer, LockfileDocument, LockfileFormat, PACKAGE_LOCK, YARN_LOCK,
};
pub use manifest::{classify_source, ManifestDocument, MANIFEST_FILE_NAME};
pub use workspace::{discover_workspace_manifests, DiscoveryFailure, ManifestSet};
