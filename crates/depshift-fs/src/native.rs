//! Native filesystem implementation using std::fs.

use crate::{FileMetadata, FileSystem};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Native filesystem scoped to a project root.
#[derive(Debug, Clone)]
pub struct NativeFileSystem {
    project_root: PathBuf,
    canonical_root: PathBuf,
}

impl NativeFileSystem {
    /// Create a new native filesystem scoped to a project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root doesn't exist or can't be canonicalized.
    pub fn new(project_root: impl AsRef<Path>) -> io::Result<Self> {
        let project_root = project_root.as_ref().canonicalize().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "Project root does not exist: {}",
                    project_root.as_ref().display()
                ),
            )
        })?;

        Ok(Self {
            canonical_root: project_root.clone(),
            project_root,
        })
    }

    /// Validate that a path is within the project root.
    ///
    /// Existing paths are canonicalized so symlinks can't be used to escape;
    /// paths that don't exist yet are normalized syntactically against their
    /// closest existing parent.
    fn validate_path(&self, path: &Path) -> io::Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };

        let resolved = match absolute.canonicalize() {
            Ok(canonical) => canonical,
            Err(_) => match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) => match parent.canonicalize() {
                    Ok(canonical_parent) => canonical_parent.join(name),
                    Err(_) => normalize_syntactically(&absolute),
                },
                _ => normalize_syntactically(&absolute),
            },
        };

        if !resolved.starts_with(&self.canonical_root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "Path traversal detected: {} is outside project root {}",
                    resolved.display(),
                    self.project_root.display()
                ),
            ));
        }

        Ok(resolved)
    }
}

fn normalize_syntactically(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                result = PathBuf::from(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(name) => result.push(name),
        }
    }
    result
}

impl FileSystem for NativeFileSystem {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.validate_path(path)?.exists())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.validate_path(path)?)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(self.validate_path(path)?)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        let validated = self.validate_path(path)?;
        match std::fs::metadata(&validated) {
            Ok(meta) => Ok(FileMetadata {
                exists: true,
                is_file: meta.is_file(),
                is_dir: meta.is_dir(),
                size: meta.len(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(FileMetadata::missing()),
            Err(e) => Err(e),
        }
    }

    /// Write to a sibling temp file, then rename it over the target.
    ///
    /// The temp file lives in the same directory so the rename never crosses
    /// filesystems.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let validated = self.validate_path(path)?;
        let temp_path = validated.with_extension(format!(
            "{}.tmp",
            validated
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("")
        ));

        std::fs::write(&temp_path, contents)?;
        if let Err(e) = std::fs::rename(&temp_path, &validated) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }

    fn glob(&self, pattern: &str) -> io::Result<Vec<PathBuf>> {
        let full_pattern = if Path::new(pattern).is_absolute() {
            PathBuf::from(pattern)
        } else {
            self.project_root.join(pattern)
        };
        let pattern_str = full_pattern.to_str().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "Glob pattern is not UTF-8")
        })?;

        let entries = glob::glob(pattern_str).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid glob pattern: {}", e),
            )
        })?;

        let mut matches: Vec<PathBuf> = entries
            .flatten()
            .filter(|p| self.validate_path(p).is_ok())
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn project_root(&self) -> &Path {
        &self.project_root
    }
}
