//! FileSystem trait for root-scoped filesystem operations.

use std::io;
use std::path::{Path, PathBuf};

/// File metadata compatible across implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Whether the path exists.
    pub exists: bool,
    /// Whether the path is a file (false if directory or doesn't exist).
    pub is_file: bool,
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// File size in bytes (0 for directories or non-existent files).
    pub size: u64,
}

impl FileMetadata {
    pub(crate) fn missing() -> Self {
        Self {
            exists: false,
            is_file: false,
            is_dir: false,
            size: 0,
        }
    }
}

/// Root-scoped filesystem abstraction.
///
/// Every call blocks until the operation finishes. Paths may be absolute or
/// relative to [`FileSystem::project_root`]; either way an implementation must
/// refuse paths that resolve outside the root.
///
/// # Writes
///
/// `write` replaces the whole file. Implementations must never leave a
/// partially written target behind: readers observe either the old or the new
/// contents.
pub trait FileSystem: Send + Sync {
    /// Check if a path exists.
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Read file contents as a string.
    ///
    /// # Errors
    ///
    /// Returns `io::ErrorKind::NotFound` if file doesn't exist.
    /// Returns `io::ErrorKind::InvalidData` if file is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Read file contents as bytes.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Get file/directory metadata.
    ///
    /// Returns metadata even if the file doesn't exist (exists=false).
    fn metadata(&self, path: &Path) -> io::Result<FileMetadata>;

    /// Replace a file's contents.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Expand a glob pattern (absolute, or relative to the root) into the
    /// matching paths, sorted.
    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>>;

    /// Get the project root this filesystem is scoped to.
    fn project_root(&self) -> &Path;

    /// Convenience wrapper over [`FileSystem::metadata`].
    fn is_dir(&self, path: &Path) -> io::Result<bool> {
        Ok(self.metadata(path)?.is_dir)
    }
}
