//! Archive codec: pack a folder into a single file and back.

use crate::error::{Result, VarchiveError};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// Archive format used for versioned archives. Possible implementations
/// are ZIP, TAR, etc.
///
/// Guarantees expected by the session manager: directory structure is
/// preserved, entry names use forward slashes and UTF-8, symbolic links
/// are not required.
pub trait ArchiveCodec {
    /// Packs the content of `folder` (recursively) into `dest`, replacing
    /// an existing destination file.
    ///
    /// Paths ending in any of `excluded_endings` are omitted; an ending
    /// matching a directory omits the whole subtree.
    fn pack(&self, folder: &Path, dest: &Path, excluded_endings: &[&str]) -> Result<()>;

    /// Unpacks `archive` into `dest_folder`, creating intermediate
    /// directories as needed.
    fn unpack(&self, archive: &Path, dest_folder: &Path) -> Result<()>;

    /// Returns the identifier of this format, e.g. `"ZIP"`.
    fn identifier(&self) -> &'static str;
}

/// The default codec: ZIP with deflate compression.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipCodec;

impl ZipCodec {
    fn err(reason: String, source: Option<io::Error>) -> VarchiveError {
        VarchiveError::Codec {
            identifier: "ZIP",
            reason,
            source,
        }
    }
}

impl ArchiveCodec for ZipCodec {
    fn pack(&self, folder: &Path, dest: &Path, excluded_endings: &[&str]) -> Result<()> {
        if !folder.is_dir() {
            return Err(Self::err(
                format!("source is not a directory: {}", folder.display()),
                None,
            ));
        }

        let file = File::create(dest)?;
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::SimpleFileOptions = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        let mut walker = walkdir::WalkDir::new(folder).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| {
                Self::err("directory walk failed".to_string(), e.into_io_error())
            })?;

            // the root itself never becomes an entry
            if entry.path() == folder {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(folder)
                .expect("walkdir yields paths under its root");

            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if excluded_endings.iter().any(|e| name.ends_with(e)) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_dir() {
                zip.add_directory(format!("{}/", name), options)
                    .map_err(|e| Self::err(format!("add directory {}: {}", name, e), None))?;
            } else {
                zip.start_file(name.as_str(), options)
                    .map_err(|e| Self::err(format!("start entry {}: {}", name, e), None))?;
                let mut src = File::open(entry.path())?;
                io::copy(&mut src, &mut zip)?;
            }
        }

        zip.finish()
            .map_err(|e| Self::err(format!("finish archive: {}", e), None))?;

        debug!(dest = %dest.display(), "packed archive");

        Ok(())
    }

    fn unpack(&self, archive: &Path, dest_folder: &Path) -> Result<()> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| Self::err(format!("open archive {}: {}", archive.display(), e), None))?;

        fs::create_dir_all(dest_folder)?;

        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| Self::err(format!("read entry {}: {}", i, e), None))?;

            // enclosed_name rejects entries that escape the destination
            let rel = entry.enclosed_name().ok_or_else(|| {
                Self::err(format!("unsafe entry name: {}", entry.name()), None)
            })?;
            let out = dest_folder.join(rel);

            if entry.is_dir() {
                fs::create_dir_all(&out)?;
            } else {
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut dest = File::create(&out)?;
                io::copy(&mut entry, &mut dest)?;
            }
        }

        debug!(archive = %archive.display(), dest = %dest_folder.display(), "unpacked archive");

        Ok(())
    }

    fn identifier(&self) -> &'static str {
        "ZIP"
    }
}
