//! package.json model

use crate::types::Source;
use crate::{Error, Result};
use depshift_config::Settings;
use depshift_fs::FileSystem;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of an npm manifest
pub const MANIFEST_FILE_NAME: &str = "package.json";

const DEFAULT_INDENT: &str = "  ";

/// A parsed package.json.
///
/// Key order is kept as written, and the indentation of the original text is
/// remembered so that rewrites only change the fields they touch.
#[derive(Debug, Clone)]
pub struct ManifestDocument {
    path: PathBuf,
    contents: Map<String, Value>,
    indent: String,
    sections: Vec<String>,
}

impl ManifestDocument {
    /// Load a manifest. `path` may be the manifest itself or its directory.
    ///
    /// # Errors
    /// `Io` if the file can't be read, `MalformedManifest` if it isn't a JSON
    /// object.
    pub fn load<F: FileSystem + ?Sized>(fs: &F, path: &Path, settings: &Settings) -> Result<Self> {
        let path = if fs.is_dir(path)? {
            path.join(MANIFEST_FILE_NAME)
        } else {
            path.to_path_buf()
        };

        debug!("Loading manifest from {}", path.display());
        let text = fs.read_to_string(&path)?;
        Self::parse(path, &text, settings.dependency_sections())
    }

    /// Parse manifest text that lives at `path`
    pub fn parse(path: impl Into<PathBuf>, text: &str, sections: Vec<String>) -> Result<Self> {
        let path = path.into();
        let contents = parse_object(&path, text)?;

        Ok(Self {
            path,
            contents,
            indent: detect_indent(text),
            sections,
        })
    }

    /// Manifest path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the manifest
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Indentation unit detected in the file
    pub fn indent(&self) -> &str {
        &self.indent
    }

    /// Sections that count as dependencies, in lookup order
    pub fn dependency_sections(&self) -> &[String] {
        &self.sections
    }

    /// Constraint for `name`; the first section listing it wins
    pub fn constraint_for(&self, name: &str) -> Option<&str> {
        self.sections.iter().find_map(|section| {
            self.contents
                .get(section)
                .and_then(|deps| deps.get(name))
                .and_then(Value::as_str)
        })
    }

    /// Every `(section, name, constraint)` in declared order
    pub fn direct_dependencies(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.sections.iter().flat_map(move |section| {
            self.contents
                .get(section)
                .and_then(Value::as_object)
                .into_iter()
                .flat_map(move |deps| {
                    deps.iter().filter_map(move |(name, constraint)| {
                        constraint
                            .as_str()
                            .map(|c| (section.as_str(), name.as_str(), c))
                    })
                })
        })
    }

    /// Direct dependencies with each name once, carrying the constraint
    /// [`constraint_for`](Self::constraint_for) would return
    pub fn unique_dependencies(&self) -> Vec<(String, String)> {
        let mut seen = std::collections::BTreeSet::new();
        self.direct_dependencies()
            .filter(|(_, name, _)| seen.insert(name.to_string()))
            .map(|(_, name, constraint)| (name.to_string(), constraint.to_string()))
            .collect()
    }

    /// Where a constraint of this manifest points
    pub fn source_for(&self, _name: &str, constraint: &str) -> Source {
        classify_source(constraint)
    }

    /// Glob patterns from the `workspaces` field
    pub fn workspace_patterns(&self) -> Vec<String> {
        let patterns = match self.contents.get("workspaces") {
            Some(Value::Array(arr)) => Some(arr),
            Some(Value::Object(obj)) => obj.get("packages").and_then(Value::as_array),
            _ => None,
        };

        patterns
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set `name` to `constraint` in every dependency section listing it and
    /// write the file back.
    ///
    /// The file is re-read first so the rewrite works on what is on disk.
    /// Returns `false` (and writes nothing) when no section lists `name`.
    ///
    /// # Errors
    /// `ManifestWrite` when the write fails.
    pub fn rewrite_constraint<F: FileSystem + ?Sized>(
        &mut self,
        fs: &F,
        name: &str,
        constraint: &str,
    ) -> Result<bool> {
        let text = fs.read_to_string(&self.path)?;
        self.contents = parse_object(&self.path, &text)?;
        self.indent = detect_indent(&text);

        let mut changed = false;
        for section in &self.sections {
            if let Some(deps) = self.contents.get_mut(section).and_then(Value::as_object_mut) {
                if let Some(slot) = deps.get_mut(name) {
                    info!(
                        "Updating {} to {} in {} of {}",
                        name,
                        constraint,
                        section,
                        self.path.display()
                    );
                    *slot = Value::String(constraint.to_string());
                    changed = true;
                }
            }
        }

        if !changed {
            return Ok(false);
        }

        let rendered = self.render()?;
        fs.write(&self.path, &rendered)
            .map_err(|source| Error::ManifestWrite {
                path: self.path.clone(),
                source,
            })?;
        Ok(true)
    }

    /// Serialize with the detected indentation and one trailing newline
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.contents.serialize(&mut serializer)?;

        let mut text = String::from_utf8(buf)
            .map_err(|e| Error::InvalidFormat(self.path.clone(), e.to_string()))?;
        text.push('\n');
        Ok(text)
    }
}

fn parse_object(path: &Path, text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::MalformedManifest {
            path: path.to_path_buf(),
            reason: "top-level value is not an object".to_string(),
        }),
        Err(e) => Err(Error::MalformedManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Indentation of the first indented line, or two spaces
pub fn detect_indent(text: &str) -> String {
    text.lines()
        .find_map(|line| {
            let trimmed = line.trim_start_matches([' ', '\t']);
            let width = line.len() - trimmed.len();
            (width > 0 && !trimmed.is_empty()).then(|| line[..width].to_string())
        })
        .unwrap_or_else(|| DEFAULT_INDENT.to_string())
}

/// Classify a manifest constraint the way npm resolves package specs
pub fn classify_source(constraint: &str) -> Source {
    let spec = constraint.trim();

    const GIT_PREFIXES: [&str; 7] = [
        "git+", "git://", "github:", "gitlab:", "bitbucket:", "gist:", "git@",
    ];
    if GIT_PREFIXES.iter().any(|p| spec.starts_with(p)) {
        return Source::Git;
    }

    if spec.starts_with("http://") || spec.starts_with("https://") {
        return if spec.ends_with(".git") || spec.contains(".git#") {
            Source::Git
        } else {
            Source::Url(spec.to_string())
        };
    }

    if let Some(rest) = spec.strip_prefix("file:") {
        return if is_tarball(rest) {
            Source::File
        } else {
            Source::Directory
        };
    }

    if ["./", "../", "/", "~/"].iter().any(|p| spec.starts_with(p)) {
        return if is_tarball(spec) {
            Source::File
        } else {
            Source::Directory
        };
    }

    if is_hosted_shorthand(spec) {
        return Source::Git;
    }

    Source::Registry
}

fn is_tarball(spec: &str) -> bool {
    let spec = spec.to_ascii_lowercase();
    spec.ends_with(".tgz") || spec.ends_with(".tar.gz") || spec.ends_with(".tar")
}

/// `owner/repo` or `owner/repo#ref`
fn is_hosted_shorthand(spec: &str) -> bool {
    if spec.starts_with('@') || spec.starts_with("npm:") {
        return false;
    }
    let repo = spec.split('#').next().unwrap_or(spec);
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) => {
            let valid = |s: &str| {
                !s.is_empty()
                    && s.chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            };
            valid(owner) && valid(name)
        }
        _ => false,
    }
}
