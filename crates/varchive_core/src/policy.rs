//! Working-area policy: what survives checkout cleanup and what is
//! omitted from packing.
//!
//! Binaries produced by build tooling must survive checkout cycles so
//! that application state built on top of the versioned content is not
//! destroyed; the history store and control record must never be wiped
//! by cleanup.

use crate::error::Result;
use crate::history::STORE_DIR;
use crate::info::INFO_FILE;
use std::fs;
use std::path::Path;

/// Endings omitted from every pack in addition to the caller-supplied
/// exclusion set: build artifacts that are rebuilt from the versioned
/// content anyway.
pub const PACK_EXCLUDED_ENDINGS: &[&str] = &[".class", "MANIFEST.MF", "vproject-info.xml"];

/// Paths and filename suffixes excluded from checkout cleanup.
///
/// The history store directory and the control record are always
/// excluded; callers extend the set with additional relative paths and
/// endings.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    paths: Vec<String>,
    endings: Vec<String>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ExclusionSet {
    /// Creates the base exclusion set.
    pub fn new() -> Self {
        Self {
            paths: vec![STORE_DIR.to_string(), INFO_FILE.to_string()],
            endings: Vec::new(),
        }
    }

    /// Adds relative paths to exclude. Each call extends the set.
    pub fn add_paths<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            let path = path.into();
            let path = path.trim_end_matches('/').to_string();
            if !self.paths.contains(&path) {
                self.paths.push(path);
            }
        }
    }

    /// Replaces the set of excluded filename endings.
    pub fn set_endings<I, S>(&mut self, endings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endings = endings.into_iter().map(Into::into).collect();
    }

    /// Returns the excluded relative paths.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Returns the excluded filename endings.
    pub fn endings(&self) -> &[String] {
        &self.endings
    }

    /// Returns `true` if the given working-area-relative path (forward
    /// slashes) is excluded from cleanup.
    pub fn is_excluded(&self, rel: &str) -> bool {
        self.paths
            .iter()
            .any(|p| rel == p || rel.starts_with(&format!("{}/", p)))
            || self.endings.iter().any(|e| rel.ends_with(e.as_str()))
    }

    /// Returns the endings handed to the codec at pack time: the fixed
    /// build-artifact set plus the caller-supplied exclusions. The
    /// history store and control record are never in this list; the
    /// archive is required to carry both.
    pub fn pack_exclusions(&self) -> Vec<String> {
        let mut result: Vec<String> = PACK_EXCLUDED_ENDINGS
            .iter()
            .map(|s| s.to_string())
            .collect();

        for path in &self.paths {
            if path != STORE_DIR && path != INFO_FILE {
                result.push(path.clone());
            }
        }

        result.extend(self.endings.iter().cloned());
        result
    }
}

/// Deletes everything under the working area except excluded paths and
/// files with excluded endings. Runs before a checkout materialises the
/// target revision.
pub fn clean_working_area(root: &Path, exclusions: &ExclusionSet) -> Result<()> {
    clean_dir(root, root, exclusions)?;
    Ok(())
}

/// Recursively cleans `dir`, returning `true` if it is empty afterwards.
fn clean_dir(root: &Path, dir: &Path, exclusions: &ExclusionSet) -> Result<bool> {
    let mut empty = true;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let rel = path
            .strip_prefix(root)
            .expect("cleanup stays under the working area")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclusions.is_excluded(&rel) {
            empty = false;
            continue;
        }

        if entry.file_type()?.is_dir() {
            if clean_dir(root, &path, exclusions)? {
                fs::remove_dir(&path)?;
            } else {
                empty = false;
            }
        } else {
            fs::remove_file(&path)?;
        }
    }

    Ok(empty)
}
