//! Shared helpers for integration tests.
//!
//! Not every test binary uses every helper.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use varchive_core::VersionedArchive;

/// Initialises the process-wide sandbox base once per test binary.
///
/// The base directory is leaked deliberately: it must outlive every test
/// in the process, and the OS reclaims it with the temp directory.
pub fn init() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let dir = tempfile::tempdir().unwrap();
        let _ = varchive_core::set_tmp_folder(dir.path());
        std::mem::forget(dir);
    });
}

/// Creates a fresh closed archive in the given directory.
pub fn create_archive(dir: &TempDir, name: &str) -> VersionedArchive {
    init();
    let mut vf = VersionedArchive::new(dir.path().join(name)).unwrap();
    vf.create().unwrap();
    vf
}

/// Appends `num_commits` timestamp lines to `file_name`, committing after
/// each one, and returns the lines in order.
///
/// After the call, version `i` of the archive holds the first `i` lines.
pub fn commit_timestamps(
    vf: &mut VersionedArchive,
    file_name: &str,
    num_commits: usize,
) -> Vec<String> {
    let path: PathBuf = vf.content().unwrap().join(file_name);
    let mut lines = Vec::new();

    for i in 1..=num_commits {
        lines.push(format!("NanoTime {}: {}", i, nano_time()));

        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&path, content).unwrap();

        vf.commit(&format!("timestamp {} added", i)).unwrap();
    }

    lines
}

/// Reads a file's lines.
pub fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn nano_time() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}
