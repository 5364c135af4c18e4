//! yarn.lock (v1) parsing and normalization

use super::{source_from_resolved, FormatNormalizer};
use crate::npm::workspace::ManifestSet;
use crate::types::{ChildDependency, DependencyRecord, Relationship};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// One resolved block of a yarn.lock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YarnEntry {
    /// Installed version
    pub version: Option<String>,
    /// Tarball or repository the version was fetched from
    pub resolved: Option<String>,
    /// `dependencies` block
    pub dependencies: BTreeMap<String, String>,
    /// `optionalDependencies` block
    pub optional_dependencies: BTreeMap<String, String>,
}

/// A parsed yarn.lock: every `name@range` key in file order, each pointing at
/// the block it heads.
#[derive(Debug, Clone, Default)]
pub struct YarnLock {
    keys: Vec<(String, usize)>,
    entries: Vec<YarnEntry>,
    index: HashMap<String, usize>,
}

impl YarnLock {
    /// Keys in file order with their entries
    pub fn iter(&self) -> impl Iterator<Item = (&str, &YarnEntry)> {
        self.keys
            .iter()
            .map(move |(key, idx)| (key.as_str(), &self.entries[*idx]))
    }

    /// Entry for an exact `name@range` key
    pub fn get(&self, key: &str) -> Option<&YarnEntry> {
        self.index.get(key).map(|idx| &self.entries[*idx])
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the lockfile has no entries
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Dependencies,
    OptionalDependencies,
    Other,
}

/// Parse yarn.lock v1 text.
///
/// # Errors
/// `InvalidFormat` (naming `path` and the line) on malformed input.
pub fn parse_yarn_lock(path: &Path, text: &str) -> Result<YarnLock> {
    let mut lock = YarnLock::default();
    let mut current: Option<YarnEntry> = None;
    let mut current_keys: Vec<String> = Vec::new();
    let mut block = Block::None;

    let invalid = |line_no: usize, reason: &str| {
        Error::InvalidFormat(path.to_path_buf(), format!("line {}: {}", line_no + 1, reason))
    };

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = line.len() - line.trim_start_matches(' ').len();
        match indent {
            0 => {
                flush(&mut lock, current.take(), &mut current_keys);
                let header = trimmed
                    .strip_suffix(':')
                    .ok_or_else(|| invalid(line_no, "expected an entry header ending in ':'"))?;
                current_keys = header
                    .split(',')
                    .map(|k| unquote(k.trim()).to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
                if current_keys.is_empty() {
                    return Err(invalid(line_no, "empty entry header"));
                }
                current = Some(YarnEntry::default());
                block = Block::None;
            }
            2 => {
                let entry = current
                    .as_mut()
                    .ok_or_else(|| invalid(line_no, "field outside of an entry"))?;
                let (key, value) = split_field(trimmed);

                block = Block::None;
                match (key, value) {
                    ("dependencies", None) => block = Block::Dependencies,
                    ("optionalDependencies", None) => block = Block::OptionalDependencies,
                    (_, None) => block = Block::Other,
                    ("version", Some(v)) => entry.version = Some(v.to_string()),
                    ("resolved", Some(v)) => entry.resolved = Some(v.to_string()),
                    _ => {}
                }
            }
            4 => {
                let entry = current
                    .as_mut()
                    .ok_or_else(|| invalid(line_no, "field outside of an entry"))?;
                let (key, value) = split_field(trimmed);
                let value = value.ok_or_else(|| invalid(line_no, "expected 'name range'"))?;

                match block {
                    Block::Dependencies => {
                        entry.dependencies.insert(key.to_string(), value.to_string());
                    }
                    Block::OptionalDependencies => {
                        entry
                            .optional_dependencies
                            .insert(key.to_string(), value.to_string());
                    }
                    Block::Other => {}
                    Block::None => return Err(invalid(line_no, "nested field without a parent")),
                }
            }
            _ => return Err(invalid(line_no, "unexpected indentation")),
        }
    }
    flush(&mut lock, current.take(), &mut current_keys);

    Ok(lock)
}

fn flush(lock: &mut YarnLock, entry: Option<YarnEntry>, keys: &mut Vec<String>) {
    let Some(entry) = entry else {
        return;
    };
    let idx = lock.entries.len();
    lock.entries.push(entry);
    for key in keys.drain(..) {
        lock.index.insert(key.clone(), idx);
        lock.keys.push((key, idx));
    }
}

/// Split `key value` / `"key" "value"` / `key:`
fn split_field(line: &str) -> (&str, Option<&str>) {
    let (key, rest) = if let Some(stripped) = line.strip_prefix('"') {
        match stripped.find('"') {
            Some(end) => (&stripped[..end], &stripped[end + 1..]),
            None => (stripped, ""),
        }
    } else {
        match line.find(|c: char| c.is_whitespace() || c == ':') {
            Some(end) => (&line[..end], &line[end..]),
            None => (line, ""),
        }
    };

    let rest = rest.trim();
    let rest = rest.strip_prefix(':').map(str::trim).unwrap_or(rest);
    if rest.is_empty() {
        (key, None)
    } else {
        (key, Some(unquote(rest)))
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Split a `name@range` key. Scoped names keep their leading `@`.
pub(crate) fn split_key(key: &str) -> Option<(&str, &str)> {
    let search_from = usize::from(key.starts_with('@'));
    let at = key[search_from..].find('@')? + search_from;
    Some((&key[..at], &key[at + 1..]))
}

/// Normalizer for yarn.lock v1
#[derive(Debug, Clone, Copy, Default)]
pub struct YarnLockNormalizer;

impl YarnLockNormalizer {
    /// First pass: pick the root-level entry for every name.
    ///
    /// A name with a manifest constraint only keeps the key whose range is
    /// exactly that constraint; a transitive name keeps whichever key comes
    /// last.
    fn root_records(
        &self,
        path: &Path,
        lock: &YarnLock,
        scope: &ManifestSet,
    ) -> Result<BTreeMap<String, DependencyRecord>> {
        let mut records = BTreeMap::new();

        for (key, entry) in lock.iter() {
            let (name, range) = split_key(key).ok_or_else(|| {
                Error::InvalidFormat(path.to_path_buf(), format!("cannot split key '{}'", key))
            })?;

            let constraint = scope.constraint_for(name);
            if constraint.is_some_and(|c| c != range) {
                continue;
            }

            let mut record = DependencyRecord::new(
                name,
                entry.version.clone(),
                constraint.map(String::from),
                source_from_resolved(entry.resolved.as_deref()),
            );
            for (child, range) in &entry.dependencies {
                record
                    .children
                    .insert(child.clone(), ChildDependency::new(range, Relationship::Direct));
            }
            for (child, range) in &entry.optional_dependencies {
                record
                    .children
                    .insert(child.clone(), ChildDependency::new(range, Relationship::Optional));
            }
            records.insert(name.to_string(), record);
        }

        Ok(records)
    }

    /// Second pass: annotate children of transitive records with the version
    /// their parent actually gets when it differs from the root install.
    fn annotate_children(
        &self,
        lock: &YarnLock,
        roots: &BTreeMap<String, DependencyRecord>,
    ) -> BTreeMap<String, DependencyRecord> {
        roots
            .iter()
            .map(|(name, record)| {
                let mut annotated = record.clone();
                if record.is_transitive {
                    for (child_name, child) in annotated.children.iter_mut() {
                        let key = format!("{}@{}", child_name, child.constraint);
                        let nested = lock.get(&key).and_then(|e| e.version.as_deref());
                        let root_install = roots
                            .get(child_name)
                            .and_then(|r| r.installed_version.as_deref());
                        if let Some(nested) = nested {
                            if Some(nested) != root_install {
                                child.installed = Some(nested.to_string());
                            }
                        }
                    }
                }
                (name.clone(), annotated)
            })
            .collect()
    }
}

impl FormatNormalizer for YarnLockNormalizer {
    fn normalize(
        &self,
        path: &Path,
        contents: &str,
        scope: &ManifestSet,
    ) -> Result<BTreeMap<String, DependencyRecord>> {
        let lock = parse_yarn_lock(path, contents)?;
        let roots = self.root_records(path, &lock, scope)?;
        Ok(self.annotate_children(&lock, &roots))
    }
}
