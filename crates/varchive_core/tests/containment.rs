//! Ancestry containment across copied and unrelated archives.

mod common;

use common::{commit_timestamps, create_archive};
use std::fs;
use tempfile::TempDir;
use varchive_core::VersionedArchive;

#[test]
fn copied_archive_contains_its_origin() {
    let dir = TempDir::new().unwrap();

    // two unrelated archives with their own histories
    let mut vf0 = create_archive(&dir, "archive0.vfile");
    vf0.open(true).unwrap();
    commit_timestamps(&mut vf0, "file1.txt", 100);
    vf0.close().unwrap();

    let mut vf1 = create_archive(&dir, "archive1.vfile");
    vf1.open(true).unwrap();
    commit_timestamps(&mut vf1, "file1.txt", 100);
    vf1.close().unwrap();

    // archive2 starts as a copy of archive1 and grows beyond it
    let path2 = dir.path().join("archive2.vfile");
    fs::copy(dir.path().join("archive1.vfile"), &path2).unwrap();

    let mut vf2 = VersionedArchive::new(&path2).unwrap();
    vf2.open(true).unwrap();
    vf0.open(true).unwrap();
    vf1.open(true).unwrap();

    commit_timestamps(&mut vf2, "file1.txt", 100);

    assert!(
        vf2.contains(&vf1).unwrap(),
        "archive2 builds on top of archive1"
    );
    assert!(
        !vf2.contains(&vf0).unwrap(),
        "archive2 and archive0 are unrelated"
    );
    assert!(
        !vf1.contains(&vf0).unwrap(),
        "archive1 and archive0 are unrelated"
    );
    assert!(
        !vf1.contains(&vf2).unwrap(),
        "archive2 has more history than archive1"
    );

    vf2.close().unwrap();
    vf1.close().unwrap();
    vf0.close().unwrap();
}

#[test]
fn equal_histories_contain_each_other() {
    let dir = TempDir::new().unwrap();

    let mut vf = create_archive(&dir, "original.vfile");
    vf.open(true).unwrap();
    commit_timestamps(&mut vf, "file1.txt", 10);
    vf.close().unwrap();

    let copy_path = dir.path().join("copy.vfile");
    fs::copy(dir.path().join("original.vfile"), &copy_path).unwrap();

    let mut copy = VersionedArchive::new(&copy_path).unwrap();
    vf.open(true).unwrap();
    copy.open(true).unwrap();

    assert!(vf.contains(&copy).unwrap());
    assert!(copy.contains(&vf).unwrap());

    copy.close().unwrap();
    vf.close().unwrap();
}
