//! Version parsing and comparison for npm-style semantic versions

use crate::range::ComparatorSets;
use crate::{Error, Result};
use node_semver::{Range, Version};
use std::cmp::Ordering;

/// Parse a version, mapping failures to [`Error::InvalidVersion`]
pub fn parse_version(raw: &str) -> Result<Version> {
    Version::parse(raw.trim()).map_err(|e| Error::invalid_version(raw, e))
}

/// Parse a range, mapping failures to [`Error::InvalidVersion`]
pub fn parse_range(raw: &str) -> Result<Range> {
    Range::parse(raw.trim()).map_err(|e| Error::invalid_version(raw, e))
}

/// Whether `raw` is a semver range rather than a tag, URL or git reference
pub fn is_valid_range(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.contains(':') || raw.contains('/') {
        return false;
    }
    Range::parse(raw).is_ok()
}

/// Check if a version satisfies a range
pub fn satisfies(version: &str, range: &str) -> Result<bool> {
    let v = parse_version(version)?;
    let r = parse_range(range)?;
    Ok(r.satisfies(&v))
}

/// Compare two versions
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse_version(a)?.cmp(&parse_version(b)?))
}

/// `a <= b`
pub fn less_or_equal(a: &str, b: &str) -> Result<bool> {
    Ok(compare_versions(a, b)? != Ordering::Greater)
}

/// Whether `version` lies strictly above the lowest version `range` admits
pub fn greater_than_range(version: &str, range: &str) -> Result<bool> {
    let v = parse_version(version)?;
    if !is_valid_range(range) {
        return Err(Error::invalid_version(range, "not a valid semver range"));
    }
    let floor = ComparatorSets::parse(range)
        .ok_or_else(|| Error::invalid_version(range, "unsupported range syntax"))?
        .floor()?;
    Ok(v > floor)
}

/// Whether two ranges normalize to the same comparator sets
pub fn ranges_equivalent(a: &str, b: &str) -> Result<bool> {
    if a.trim() == b.trim() {
        return Ok(true);
    }
    Ok(parse_range(a)? == parse_range(b)?)
}

/// Determine update type (major, minor, patch)
pub fn update_type(current: &str, latest: &str) -> Result<UpdateType> {
    let c = parse_version(current)?;
    let l = parse_version(latest)?;

    Ok(if l <= c {
        UpdateType::None
    } else if l.major > c.major {
        UpdateType::Major
    } else if l.minor > c.minor {
        UpdateType::Minor
    } else if l.patch > c.patch {
        UpdateType::Patch
    } else {
        UpdateType::Prerelease
    })
}

/// Type of version update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    /// Major version bump (1.0.0 -> 2.0.0) - potentially breaking
    Major,
    /// Minor version bump (1.0.0 -> 1.1.0) - new features
    Minor,
    /// Patch version bump (1.0.0 -> 1.0.1) - bug fixes
    Patch,
    /// Prerelease moved forward on the same release (1.0.0-rc.1 -> 1.0.0)
    Prerelease,
    /// No update needed - already on latest
    None,
}

impl UpdateType {
    /// Check if this is a breaking change
    pub fn is_breaking(&self) -> bool {
        matches!(self, UpdateType::Major)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ranges() {
        assert!(is_valid_range("^1.0.0"));
        assert!(is_valid_range("~1.2"));
        assert!(is_valid_range(">=1.0.0 <2.0.0"));
        assert!(is_valid_range("1.x || 3"));
        assert!(is_valid_range("*"));

        assert!(!is_valid_range("latest"));
        assert!(!is_valid_range("github:user/repo"));
        assert!(!is_valid_range("git+https://example.com/repo.git"));
        assert!(!is_valid_range("file:../local"));
    }

    #[test]
    fn test_satisfies() {
        assert!(satisfies("1.0.1", "^1.0.0").unwrap());
        assert!(satisfies("1.1.0", "^1.0.0").unwrap());
        assert!(!satisfies("2.0.0", "^1.0.0").unwrap());
        assert!(matches!(
            satisfies("nope", "^1.0.0"),
            Err(Error::InvalidVersion(_, _))
        ));
    }

    #[test]
    fn test_version_comparison() {
        assert_eq!(compare_versions("1.0.0", "1.0.1").unwrap(), Ordering::Less);
        assert_eq!(compare_versions("1.0.0", "1.0.0").unwrap(), Ordering::Equal);
        assert_eq!(compare_versions("2.0.0", "1.0.0").unwrap(), Ordering::Greater);
        assert!(less_or_equal("1.1.0", "1.1.0").unwrap());
        assert!(!less_or_equal("2.0.0", "1.1.0").unwrap());
    }

    #[test]
    fn test_greater_than_range() {
        assert!(greater_than_range("1.1.0", "^1.0.0").unwrap());
        assert!(greater_than_range("2.0.0", "^1.0.0").unwrap());
        assert!(!greater_than_range("1.0.0", "^1.0.0").unwrap());
        assert!(!greater_than_range("0.9.0", "^1.0.0").unwrap());
        assert!(!greater_than_range("1.2.0", ">1.2.0").unwrap());
        assert!(greater_than_range("1.2.1", ">1.2.0").unwrap());
        assert!(greater_than_range("1.0.0", "<2.0.0").unwrap());
        assert!(greater_than_range("1.0.0", "latest").is_err());
    }

    #[test]
    fn test_ranges_equivalent() {
        assert!(ranges_equivalent("^1.2.0", "^1.2.0").unwrap());
        assert!(ranges_equivalent(">=1.0.0  <2.0.0", ">=1.0.0 <2.0.0").unwrap());
        assert!(!ranges_equivalent("^1.2.0", "^1.3.0").unwrap());
    }

    #[test]
    fn test_update_type() {
        assert_eq!(update_type("1.0.0", "2.0.0").unwrap(), UpdateType::Major);
        assert_eq!(update_type("1.0.0", "1.1.0").unwrap(), UpdateType::Minor);
        assert_eq!(update_type("1.0.0", "1.0.1").unwrap(), UpdateType::Patch);
        assert_eq!(update_type("1.0.0-rc.1", "1.0.0").unwrap(), UpdateType::Prerelease);
        assert_eq!(update_type("1.0.0", "1.0.0").unwrap(), UpdateType::None);
        assert_eq!(update_type("2.0.0", "1.0.0").unwrap(), UpdateType::None);
        assert!(UpdateType::Major.is_breaking());
    }
}
