//! End-to-end lifecycle scenarios: create, commit, navigate, reopen.

mod common;

use common::{commit_timestamps, create_archive, init, read_lines};
use std::fs;
use tempfile::TempDir;
use varchive_core::{ArchiveCodec, VarchiveError, VersionedArchive, ZipCodec};

#[test]
fn create_commit_navigate() {
    let dir = TempDir::new().unwrap();
    let mut vf = create_archive(&dir, "project.vfile");
    vf.open(true).unwrap();

    let file = vf.content().unwrap().join("file1.txt");

    // version 1: empty file
    fs::write(&file, "").unwrap();
    vf.commit("empty").unwrap();
    assert_eq!(vf.number_of_versions().unwrap(), 1);

    // versions 2 and 3: one line appended each
    fs::write(&file, "NanoTime 1: 1000\n").unwrap();
    vf.commit("ts1").unwrap();
    fs::write(&file, "NanoTime 1: 1000\nNanoTime 2: 2000\n").unwrap();
    vf.commit("ts2").unwrap();
    assert_eq!(vf.number_of_versions().unwrap(), 3);

    vf.checkout_latest_version().unwrap();
    assert_eq!(read_lines(&file).len(), 2);

    vf.checkout_previous_version().unwrap();
    assert_eq!(read_lines(&file).len(), 1);

    vf.checkout_previous_version().unwrap();
    assert_eq!(read_lines(&file).len(), 0);

    assert!(!vf.has_previous_version().unwrap());

    vf.close().unwrap();
}

#[test]
fn commit_then_checkout_latest_is_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut vf = create_archive(&dir, "roundtrip.vfile");
    vf.open(true).unwrap();

    let content = vf.content().unwrap().to_path_buf();
    fs::write(content.join("a.txt"), "alpha").unwrap();
    fs::create_dir_all(content.join("sub")).unwrap();
    fs::write(content.join("sub/b.txt"), "beta").unwrap();

    vf.commit("snapshot").unwrap();
    vf.checkout_latest_version().unwrap();

    assert_eq!(fs::read_to_string(content.join("a.txt")).unwrap(), "alpha");
    assert_eq!(
        fs::read_to_string(content.join("sub/b.txt")).unwrap(),
        "beta"
    );
    assert!(!vf.has_uncommitted_changes().unwrap());

    vf.close().unwrap();
}

#[test]
fn reopened_archive_yields_identical_trees() {
    let dir = TempDir::new().unwrap();
    let mut vf = create_archive(&dir, "reopen.vfile");
    vf.open(true).unwrap();

    commit_timestamps(&mut vf, "file1.txt", 5);
    let n = vf.number_of_versions().unwrap();

    // capture every version's content before closing
    let file = vf.content().unwrap().join("file1.txt");
    let mut snapshots = Vec::new();
    for i in 1..=n {
        vf.checkout_version(i).unwrap();
        snapshots.push(fs::read(&file).unwrap());
    }

    vf.close().unwrap();
    vf.open(true).unwrap();

    assert_eq!(vf.number_of_versions().unwrap(), n);
    let file = vf.content().unwrap().join("file1.txt");
    for i in 1..=n {
        vf.checkout_version(i).unwrap();
        assert_eq!(
            fs::read(&file).unwrap(),
            snapshots[i - 1],
            "version {} differs after reopen",
            i
        );
    }

    vf.close().unwrap();
}

#[test]
fn open_rejects_archive_without_control_record() {
    init();
    let dir = TempDir::new().unwrap();

    // a perfectly fine ZIP that is not a versioned archive
    let payload = dir.path().join("payload");
    fs::create_dir_all(&payload).unwrap();
    fs::write(payload.join("innocent.txt"), "data").unwrap();

    let fake = dir.path().join("fake.vfile");
    ZipCodec.pack(&payload, &fake, &[]).unwrap();

    let mut vf = VersionedArchive::new(&fake).unwrap();
    let result = vf.open(true);

    assert!(matches!(result, Err(VarchiveError::InvalidArchive { .. })));
    assert!(!vf.is_opened(), "no sandbox may be left behind");

    // the registry slot was rolled back too: a retry reports the same
    // error instead of AlreadyOpen
    assert!(matches!(
        vf.open(true),
        Err(VarchiveError::InvalidArchive { .. })
    ));
}

#[test]
fn second_open_on_same_archive_fails() {
    let dir = TempDir::new().unwrap();
    let mut vf = create_archive(&dir, "exclusive.vfile");
    vf.open(true).unwrap();

    let mut second = VersionedArchive::new(vf.file()).unwrap();
    assert!(matches!(
        second.open(true),
        Err(VarchiveError::AlreadyOpen(_))
    ));

    vf.close().unwrap();

    // after close the path is free again
    second.open(true).unwrap();
    second.close().unwrap();
}

#[test]
fn tmp_folder_cannot_be_reconfigured() {
    init();

    let other = TempDir::new().unwrap();
    assert!(matches!(
        varchive_core::set_tmp_folder(other.path()),
        Err(VarchiveError::TmpAlreadyInitialized(_))
    ));
}

#[test]
fn versions_carry_messages_in_commit_order() {
    let dir = TempDir::new().unwrap();
    let mut vf = create_archive(&dir, "ordered.vfile");
    vf.open(true).unwrap();

    let file = vf.content().unwrap().join("f.txt");
    for msg in ["first", "second", "third"] {
        fs::write(&file, msg).unwrap();
        vf.commit(msg).unwrap();
    }

    let versions = vf.versions().unwrap();
    let messages: Vec<&str> = versions[1..].iter().map(|c| c.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second", "third"]);

    vf.close().unwrap();
}
