//! HEAD pointer management for the history store.

use crate::error::{Result, VarchiveError};
use crate::ObjectId;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Manages the HEAD reference of a history store.
///
/// HEAD is a single-line text file containing the hex-encoded id of the
/// newest commit. Writes are atomic (temp file + fsync + rename) so a
/// crash mid-commit never leaves a torn pointer.
pub struct Refs {
    root: PathBuf,
}

impl Refs {
    /// Creates a new `Refs` manager rooted at the store directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Reads the HEAD reference.
    ///
    /// # Errors
    ///
    /// Returns `NoHead` if HEAD doesn't exist and `CorruptedObject` if the
    /// content is malformed.
    pub fn read_head(&self) -> Result<ObjectId> {
        let path = self.root.join("HEAD");

        if !path.exists() {
            return Err(VarchiveError::NoHead);
        }

        let content = fs::read_to_string(&path)?;
        let trimmed = content.trim();

        if trimmed.len() != ObjectId::HEX_LEN {
            return Err(VarchiveError::CorruptedObject {
                path,
                reason: format!("expected 64 hex chars, got {}", trimmed.len()),
            });
        }

        ObjectId::from_hex(trimmed).map_err(|_| VarchiveError::CorruptedObject {
            path: self.root.join("HEAD"),
            reason: "invalid hex string".to_string(),
        })
    }

    /// Returns `true` if a HEAD reference exists.
    pub fn has_head(&self) -> bool {
        self.root.join("HEAD").exists()
    }

    /// Writes the HEAD reference atomically.
    pub fn write_head(&self, id: ObjectId) -> Result<()> {
        let path = self.root.join("HEAD");
        let tmp_path = path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)?;
            writeln!(file, "{}", id)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;

        // fsync parent directory (Unix-specific for crash safety)
        #[cfg(unix)]
        {
            if let Ok(dir_file) = File::open(&self.root) {
                let _ = dir_file.sync_all();
            }
        }

        Ok(())
    }
}
