//! In-memory filesystem implementation.

use crate::{FileMetadata, FileSystem};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// In-memory filesystem.
///
/// Directories are implicit: a path is a directory when some stored file lives
/// beneath it. Clones share the same storage, so a test can keep a handle and
/// inspect what the code under test wrote.
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    project_root: PathBuf,
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MemoryFileSystem {
    /// Create an empty filesystem rooted at `project_root` (e.g. "/project").
    pub fn new(project_root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            project_root: Self::normalize(project_root.as_ref())?,
            files: Arc::new(RwLock::new(BTreeMap::new())),
        })
    }

    /// Builder-style helper that stores a file and returns `self`.
    pub fn with_file(self, path: impl AsRef<Path>, contents: impl Into<String>) -> io::Result<Self> {
        self.insert(path.as_ref(), contents.into().into_bytes())?;
        Ok(self)
    }

    /// Store a file, replacing any previous contents.
    pub fn insert(&self, path: &Path, contents: Vec<u8>) -> io::Result<()> {
        let validated = self.validate_path(path)?;
        self.files.write().insert(validated, contents);
        Ok(())
    }

    /// All stored file paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    fn normalize(path: &Path) -> io::Result<PathBuf> {
        let mut components: Vec<&std::ffi::OsStr> = Vec::new();
        let mut is_absolute = false;

        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    is_absolute = true;
                    components.clear();
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if components.pop().is_none() {
                        return Err(io::Error::new(
                            io::ErrorKind::PermissionDenied,
                            "Path attempts to escape root using ..",
                        ));
                    }
                }
                Component::Normal(name) => components.push(name),
            }
        }

        let mut result = PathBuf::new();
        if is_absolute {
            result.push("/");
        }
        for component in components {
            result.push(component);
        }
        Ok(result)
    }

    fn validate_path(&self, path: &Path) -> io::Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };
        let normalized = Self::normalize(&absolute)?;

        if !normalized.starts_with(&self.project_root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "Path traversal detected: {} is outside {}",
                    normalized.display(),
                    self.project_root.display()
                ),
            ));
        }
        Ok(normalized)
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.metadata(path)?.exists)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let normalized = self.validate_path(path)?;
        self.files.read().get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", normalized.display()),
            )
        })
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        let normalized = self.validate_path(path)?;
        let files = self.files.read();

        if let Some(contents) = files.get(&normalized) {
            return Ok(FileMetadata {
                exists: true,
                is_file: true,
                is_dir: false,
                size: contents.len() as u64,
            });
        }

        let is_dir = files
            .keys()
            .any(|p| p != &normalized && p.starts_with(&normalized));
        if is_dir {
            Ok(FileMetadata {
                exists: true,
                is_file: false,
                is_dir: true,
                size: 0,
            })
        } else {
            Ok(FileMetadata::missing())
        }
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.insert(path, contents.as_bytes().to_vec())
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let full_pattern = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            self.project_root.join(pattern)
        };
        let compiled = glob::Pattern::new(&full_pattern.to_string_lossy()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid glob pattern: {}", e),
            )
        })?;

        let options = glob::MatchOptions {
            require_literal_separator: true,
            ..glob::MatchOptions::new()
        };

        // BTreeMap keys are already sorted.
        Ok(self
            .files
            .read()
            .keys()
            .filter(|p| compiled.matches_path_with(p, options))
            .cloned()
            .collect())
    }

    fn project_root(&self) -> &Path {
        &self.project_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories_are_implicit() {
        let fs = MemoryFileSystem::new("/project")
            .unwrap()
            .with_file("packages/a/package.json", "{}")
            .unwrap();

        assert!(fs.is_dir(Path::new("/project/packages")).unwrap());
        assert!(fs.is_dir(Path::new("packages/a")).unwrap());
        assert!(!fs.is_dir(Path::new("packages/a/package.json")).unwrap());
        assert!(!fs.exists(Path::new("packages/b")).unwrap());
    }

    #[test]
    fn test_rejects_escape() {
        let fs = MemoryFileSystem::new("/project").unwrap();
        assert!(fs.read(Path::new("../etc/passwd")).is_err());
    }
}
