//! Per-version consistency over a long history.

mod common;

use common::{commit_timestamps, create_archive, read_lines};
use tempfile::TempDir;

#[test]
fn every_version_reproduces_its_own_snapshot() {
    let dir = TempDir::new().unwrap();
    let mut vf = create_archive(&dir, "history.vfile");
    vf.open(true).unwrap();

    let timestamps = commit_timestamps(&mut vf, "file1.txt", 100);

    let n = vf.number_of_versions().unwrap();
    assert_eq!(n, 100);

    let file = vf.content().unwrap().join("file1.txt");

    for i in 1..=n {
        vf.checkout_version(i).unwrap();

        let lines = read_lines(&file);
        assert_eq!(lines.len(), i, "version {} must hold {} lines", i, i);
        assert_eq!(
            lines[i - 1],
            timestamps[i - 1],
            "line {} of version {} differs",
            i - 1,
            i
        );
    }

    vf.close().unwrap();
}
