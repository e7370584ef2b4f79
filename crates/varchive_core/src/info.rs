//! Control record identifying a directory as a valid versioned archive.

use crate::error::{Result, VarchiveError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// File name of the control record inside a working area.
pub const INFO_FILE: &str = ".versioned-archive-info.toml";

/// Format version written into newly created archives.
pub const FORMAT_VERSION: &str = "0.1";

/// The wildcard component of a version tag.
const UNDEFINED: &str = "x";

/// A dotted-numeric version tag, e.g. `0.3.8.10` or `1.3`.
///
/// The character `x` denotes an undefined trailing component; comparison
/// stops at the first wildcard, so `3.x` matches every `3.*` version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    /// Parses and validates a version string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the string does not match the
    /// `N(.N)*` grammar with an optional trailing `x` wildcard.
    pub fn parse(s: &str) -> Result<Self> {
        parse_components(s)?;
        Ok(Self(s.to_string()))
    }

    /// Returns the raw version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric components up to the first `x` wildcard.
    fn components(&self) -> Vec<u64> {
        // valid by construction
        parse_components(&self.0).unwrap_or_default()
    }
}

/// Splits a version string into its numeric components, stopping at the
/// first `x` wildcard.
fn parse_components(s: &str) -> Result<Vec<u64>> {
    if s.is_empty() {
        return Err(VarchiveError::InvalidArgument(
            "version string is empty".to_string(),
        ));
    }

    let mut result = Vec::new();

    for part in s.split('.') {
        if part == UNDEFINED {
            break;
        }

        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VarchiveError::InvalidArgument(format!(
                "version string has wrong format: \"{}\"",
                s
            )));
        }

        result.push(part.parse::<u64>().map_err(|_| {
            VarchiveError::InvalidArgument(format!("version component too large: \"{}\"", part))
        })?);
    }

    Ok(result)
}

impl FromStr for VersionTag {
    type Err = VarchiveError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for VersionTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_tag(other) == Ordering::Equal
    }
}

impl Eq for VersionTag {}

impl VersionTag {
    /// Compares two tags component-wise over the shared prefix length.
    ///
    /// Components after the first `x` wildcard on either side never take
    /// part in the comparison, so `3.x == 3.5` and `3.x < 4.0`.
    pub fn cmp_tag(&self, other: &Self) -> Ordering {
        let ours = self.components();
        let theirs = other.components();

        for (a, b) in ours.iter().zip(theirs.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        Ordering::Equal
    }
}

/// The control record: a small descriptor pinned at [`INFO_FILE`] inside
/// every valid versioned archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Format version of the archive.
    pub version: VersionTag,
    /// Human-readable description.
    pub description: String,
}

impl ArchiveInfo {
    /// Returns the control record written into newly created archives.
    pub fn current() -> Self {
        Self {
            version: VersionTag::parse(FORMAT_VERSION).expect("built-in version is valid"),
            description: "versioned archive".to_string(),
        }
    }

    /// Writes the control record into `content_dir`.
    pub fn save(&self, content_dir: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| VarchiveError::Serialization(e.to_string()))?;
        fs::write(content_dir.join(INFO_FILE), text)?;
        Ok(())
    }

    /// Loads the control record from `content_dir`.
    ///
    /// Returns `Ok(None)` when no control record exists; a present but
    /// malformed record is an error, because it means the directory claims
    /// to be a versioned archive and is damaged.
    pub fn load(content_dir: &Path) -> Result<Option<Self>> {
        let path = content_dir.join(INFO_FILE);

        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)?;
        let info: ArchiveInfo = toml::from_str(&text).map_err(|e| {
            VarchiveError::InvalidArgument(format!("malformed control record: {}", e))
        })?;

        // serde accepts any string for the transparent tag; re-validate
        VersionTag::parse(info.version.as_str())?;

        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn grammar_accepts_valid_tags() {
        for s in ["0.1", "1.2.3", "3.x", "x", "0.3.8.10", "4.30.100"] {
            assert!(VersionTag::parse(s).is_ok(), "should accept {:?}", s);
        }
    }

    #[test]
    fn grammar_rejects_invalid_tags() {
        for s in ["1..2", "1.a", "", ".", "1.", "a", "1.2x"] {
            assert!(VersionTag::parse(s).is_err(), "should reject {:?}", s);
        }
    }

    #[test]
    fn comparison_is_componentwise() {
        let v = |s| VersionTag::parse(s).unwrap();

        assert_eq!(v("1.2").cmp_tag(&v("1.2")), Ordering::Equal);
        assert_eq!(v("1.2").cmp_tag(&v("1.3")), Ordering::Less);
        assert_eq!(v("2.0").cmp_tag(&v("1.9")), Ordering::Greater);
        // shorter tag compares over the shared prefix
        assert_eq!(v("1").cmp_tag(&v("1.5")), Ordering::Equal);
    }

    #[test]
    fn wildcard_truncates_comparison() {
        let v = |s| VersionTag::parse(s).unwrap();

        assert_eq!(v("3.x").cmp_tag(&v("3.5")), Ordering::Equal);
        assert_eq!(v("3.x").cmp_tag(&v("4.0")), Ordering::Less);
        assert_eq!(v("x").cmp_tag(&v("17.4")), Ordering::Equal);
    }

    #[test]
    fn save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();

        let info = ArchiveInfo::current();
        info.save(tmp.path()).unwrap();

        let loaded = ArchiveInfo::load(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded, info);
        assert_eq!(loaded.version.as_str(), FORMAT_VERSION);
    }

    #[test]
    fn load_without_record_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(ArchiveInfo::load(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn malformed_record_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(INFO_FILE), "not toml at all [").unwrap();
        assert!(ArchiveInfo::load(tmp.path()).is_err());
    }

    #[test]
    fn invalid_version_in_record_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(INFO_FILE),
            "version = \"1..2\"\ndescription = \"bad\"\n",
        )
        .unwrap();
        assert!(ArchiveInfo::load(tmp.path()).is_err());
    }
}
