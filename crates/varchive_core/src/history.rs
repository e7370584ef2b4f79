//! The embedded revision store: commits, trees, staging, and checkout reads.
//!
//! A [`HistoryStore`] lives inside a session's working area under
//! [`STORE_DIR`] and records linear snapshots of everything else in that
//! directory. It is deliberately small: content-addressed objects, one
//! HEAD pointer, and a staging index file. No branches, no merges.

use crate::error::{Result, VarchiveError};
use crate::object_store::ObjectStore;
use crate::refs::Refs;
use crate::types::{Commit, CommitRecord, Tree, TreeEntry, TreeEntryKind, WorkStatus};
use crate::ObjectId;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name of the history store inside a working area.
pub const STORE_DIR: &str = ".vstore";

/// Staging index file name inside the store directory.
const INDEX_FILE: &str = "INDEX";

/// Author recorded on the private root commit.
const ROOT_AUTHOR: &str = "varchive";

/// Message recorded on the private root commit.
const ROOT_MESSAGE: &str = "initial commit";

/// A content-addressed snapshot store rooted inside a working area.
///
/// The store tracks every file under its working directory except its own
/// directory. The staging index mirrors git's: `add_all` stages additions
/// and modifications but never deletions, which are staged explicitly via
/// [`HistoryStore::rm`].
pub struct HistoryStore {
    workdir: PathBuf,
    store_dir: PathBuf,
    objects: ObjectStore,
    refs: Refs,
}

impl HistoryStore {
    /// Creates a fresh store in `workdir`, staging all present files and
    /// recording them as the private root commit.
    ///
    /// An existing store in the same working area is destroyed first, which
    /// is what collapses history for `delete_history`.
    pub fn init(workdir: impl AsRef<Path>) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let store_dir = workdir.join(STORE_DIR);

        if store_dir.exists() {
            debug!(path = %store_dir.display(), "removing existing history store");
            fs::remove_dir_all(&store_dir)?;
        }

        fs::create_dir_all(store_dir.join("objects"))?;

        let store = Self {
            objects: ObjectStore::new(store_dir.join("objects")),
            refs: Refs::new(&store_dir),
            workdir,
            store_dir,
        };

        store.add_all()?;
        store.commit_internal(ROOT_MESSAGE, ROOT_AUTHOR, true)?;

        Ok(store)
    }

    /// Attaches to an existing store in `workdir`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if no store directory exists.
    pub fn open(workdir: impl AsRef<Path>) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let store_dir = workdir.join(STORE_DIR);

        if !store_dir.is_dir() {
            return Err(VarchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no history store in {}", workdir.display()),
            )));
        }

        Ok(Self {
            objects: ObjectStore::new(store_dir.join("objects")),
            refs: Refs::new(&store_dir),
            workdir,
            store_dir,
        })
    }

    /// Returns the working directory this store tracks.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Computes the working-tree status.
    ///
    /// Compares HEAD, the staging index, and the working tree pairwise;
    /// each path lands in at most one category per pair.
    pub fn status(&self) -> Result<WorkStatus> {
        let head = self.head_tree_map()?;
        let index = self.read_index()?;
        let worktree = self.scan_worktree()?;

        let mut status = WorkStatus::default();

        for (path, id) in &index {
            match head.get(path) {
                None => {
                    status.added.insert(path.clone());
                }
                Some(head_id) if head_id != id => {
                    status.changed.insert(path.clone());
                }
                Some(_) => {}
            }

            match worktree.get(path) {
                None => {
                    status.missing.insert(path.clone());
                }
                Some(work_id) if work_id != id => {
                    status.modified.insert(path.clone());
                }
                Some(_) => {}
            }
        }

        for path in head.keys() {
            if !index.contains_key(path) {
                status.removed.insert(path.clone());
            }
        }

        for path in worktree.keys() {
            if !index.contains_key(path) {
                status.untracked.insert(path.clone());
            }
        }

        Ok(status)
    }

    /// Stages every file currently present in the working tree.
    ///
    /// Existing index entries for files no longer on disk are kept; only
    /// [`HistoryStore::rm`] stages a deletion.
    pub fn add_all(&self) -> Result<()> {
        let worktree = self.scan_worktree()?;
        let mut index = self.read_index()?;

        for (path, _) in worktree {
            let data = fs::read(self.workdir.join(&path))?;
            let id = self.objects.put_blob(&data)?;
            index.insert(path, id);
        }

        self.write_index(&index)
    }

    /// Stages the deletion of the given paths.
    pub fn rm<I, S>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = self.read_index()?;
        for path in paths {
            index.remove(path.as_ref());
        }
        self.write_index(&index)
    }

    /// Records the staged state as a new commit and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `NothingToCommit` if the staged tree equals HEAD's tree and
    /// `NoHead` if the store has no root commit.
    pub fn commit(&self, message: &str, author: &str) -> Result<ObjectId> {
        if !self.refs.has_head() {
            return Err(VarchiveError::NoHead);
        }
        self.commit_internal(message, author, false)
    }

    /// Commit implementation shared by the public path, the root commit,
    /// and the history-collapsing commit (which must be allowed to be
    /// empty because re-init already recorded the full tree).
    pub(crate) fn commit_internal(
        &self,
        message: &str,
        author: &str,
        allow_empty: bool,
    ) -> Result<ObjectId> {
        let index = self.read_index()?;
        let tree_id = self.write_tree(&index)?;

        let parents = match self.refs.read_head() {
            Ok(head_id) => {
                let head: Commit = self.objects.get_typed(head_id)?;
                if !allow_empty && head.root_tree == tree_id {
                    return Err(VarchiveError::NothingToCommit);
                }
                vec![head_id]
            }
            Err(VarchiveError::NoHead) => vec![],
            Err(e) => return Err(e),
        };

        let commit = Commit {
            parents,
            timestamp_unix: unix_now(),
            author: author.to_string(),
            message: message.to_string(),
            root_tree: tree_id,
        };

        let commit_id = self.objects.put_typed(&commit)?;
        self.refs.write_head(commit_id)?;

        debug!(id = %commit_id, message, "created commit");

        Ok(commit_id)
    }

    /// Lists all commits oldest first, root included.
    ///
    /// The history is a linear chain, so walking parent pointers from HEAD
    /// and reversing gives a deterministic total order.
    pub fn commits_topo_reversed(&self) -> Result<Vec<CommitRecord>> {
        let mut records = Vec::new();
        let mut current = Some(self.refs.read_head()?);

        while let Some(id) = current {
            let commit: Commit = self.objects.get_typed(id)?;
            current = commit.parents.first().copied();
            records.push(CommitRecord {
                id,
                parents: commit.parents,
                timestamp_unix: commit.timestamp_unix,
                author: commit.author,
                message: commit.message,
            });
        }

        records.reverse();
        Ok(records)
    }

    /// Returns the flat `(path, blob_id)` list of a commit's tree,
    /// excluding tree-only entries.
    pub fn read_tree(&self, commit_id: ObjectId) -> Result<Vec<(String, ObjectId)>> {
        let commit: Commit = self.objects.get_typed(commit_id)?;
        let mut files = Vec::new();
        self.collect_tree_files(commit.root_tree, "", &mut files)?;
        Ok(files)
    }

    /// Streams a blob's bytes to the given writer.
    pub fn read_blob(&self, blob_id: ObjectId, out: &mut dyn Write) -> Result<()> {
        self.objects.copy_blob_to(blob_id, out)
    }

    fn collect_tree_files(
        &self,
        tree_id: ObjectId,
        prefix: &str,
        files: &mut Vec<(String, ObjectId)>,
    ) -> Result<()> {
        let tree: Tree = self.objects.get_typed(tree_id)?;

        for entry in tree.entries {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };

            match entry.kind {
                TreeEntryKind::Blob => files.push((path, entry.id)),
                TreeEntryKind::Tree => self.collect_tree_files(entry.id, &path, files)?,
            }
        }

        Ok(())
    }

    /// Returns the flat path map of HEAD's tree, or an empty map before
    /// the root commit exists.
    fn head_tree_map(&self) -> Result<BTreeMap<String, ObjectId>> {
        match self.refs.read_head() {
            Ok(head_id) => Ok(self.read_tree(head_id)?.into_iter().collect()),
            Err(VarchiveError::NoHead) => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Walks the working tree, hashing every file outside the store
    /// directory. Paths are relative, forward-slash separated.
    fn scan_worktree(&self) -> Result<BTreeMap<String, ObjectId>> {
        let mut map = BTreeMap::new();

        for entry in walkdir::WalkDir::new(&self.workdir)
            .into_iter()
            .filter_entry(|e| e.file_name().to_str() != Some(STORE_DIR))
        {
            let entry = entry.map_err(|e| {
                VarchiveError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walkdir loop")
                }))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.workdir)
                .expect("walkdir yields paths under its root");
            let path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let data = fs::read(entry.path())?;
            map.insert(path, ObjectId::of_blob(&data));
        }

        Ok(map)
    }

    /// Reads the staging index, or an empty index when none exists yet.
    fn read_index(&self) -> Result<BTreeMap<String, ObjectId>> {
        let path = self.store_dir.join(INDEX_FILE);

        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let data = fs::read(&path)?;
        let entries: Vec<(String, ObjectId)> = postcard::from_bytes(&data)
            .map_err(|e| VarchiveError::Deserialization(format!("staging index: {}", e)))?;

        Ok(entries.into_iter().collect())
    }

    /// Writes the staging index atomically.
    fn write_index(&self, index: &BTreeMap<String, ObjectId>) -> Result<()> {
        let entries: Vec<(&String, &ObjectId)> = index.iter().collect();
        let data = postcard::to_allocvec(&entries)
            .map_err(|e| VarchiveError::Serialization(format!("staging index: {}", e)))?;

        let path = self.store_dir.join(INDEX_FILE);
        let tmp_path = path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Builds and stores the hierarchical tree for the given index,
    /// returning the root tree id.
    fn write_tree(&self, index: &BTreeMap<String, ObjectId>) -> Result<ObjectId> {
        self.write_tree_level(index.iter().map(|(p, id)| (p.as_str(), *id)).collect())
    }

    fn write_tree_level(&self, entries: Vec<(&str, ObjectId)>) -> Result<ObjectId> {
        let mut blobs: Vec<TreeEntry> = Vec::new();
        let mut subdirs: BTreeMap<&str, Vec<(&str, ObjectId)>> = BTreeMap::new();

        for (path, id) in entries {
            match path.split_once('/') {
                None => blobs.push(TreeEntry {
                    name: path.to_string(),
                    kind: TreeEntryKind::Blob,
                    id,
                }),
                Some((dir, rest)) => subdirs.entry(dir).or_default().push((rest, id)),
            }
        }

        for (dir, children) in subdirs {
            let subtree_id = self.write_tree_level(children)?;
            blobs.push(TreeEntry {
                name: dir.to_string(),
                kind: TreeEntryKind::Tree,
                id: subtree_id,
            });
        }

        self.objects.put_typed(&Tree::new(blobs))
    }
}

/// Current Unix timestamp in seconds.
fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, path: &str, content: &str) {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    #[test]
    fn init_records_present_files_as_root() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", "alpha");
        write(tmp.path(), "sub/b.txt", "beta");

        let store = HistoryStore::init(tmp.path()).unwrap();

        let commits = store.commits_topo_reversed().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "initial commit");
        assert!(commits[0].parents.is_empty());

        let mut files = store.read_tree(commits[0].id).unwrap();
        files.sort();
        let paths: Vec<_> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub/b.txt"]);

        assert!(store.status().unwrap().is_clean());
    }

    #[test]
    fn commit_advances_linear_history() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::init(tmp.path()).unwrap();

        write(tmp.path(), "file.txt", "v1");
        store.add_all().unwrap();
        let c1 = store.commit("first", "tester").unwrap();

        write(tmp.path(), "file.txt", "v2");
        store.add_all().unwrap();
        let c2 = store.commit("second", "tester").unwrap();

        let commits = store.commits_topo_reversed().unwrap();
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[1].id, c1);
        assert_eq!(commits[2].id, c2);
        assert_eq!(commits[2].parents, vec![c1]);
    }

    #[test]
    fn empty_commit_is_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.txt", "content");
        let store = HistoryStore::init(tmp.path()).unwrap();

        store.add_all().unwrap();
        assert!(matches!(
            store.commit("noop", "tester"),
            Err(VarchiveError::NothingToCommit)
        ));
    }

    #[test]
    fn status_categorises_changes() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "keep.txt", "keep");
        write(tmp.path(), "gone.txt", "gone");
        let store = HistoryStore::init(tmp.path()).unwrap();

        // modified + untracked + missing
        write(tmp.path(), "keep.txt", "changed");
        write(tmp.path(), "new.txt", "new");
        fs::remove_file(tmp.path().join("gone.txt")).unwrap();

        let status = store.status().unwrap();
        assert!(status.modified.contains("keep.txt"));
        assert!(status.untracked.contains("new.txt"));
        assert!(status.missing.contains("gone.txt"));
        assert!(status.conflicting.is_empty());

        // rm + add_all stage everything; commit cleans up
        store.rm(status.missing.iter()).unwrap();
        store.add_all().unwrap();

        let staged = store.status().unwrap();
        assert!(staged.changed.contains("keep.txt"));
        assert!(staged.added.contains("new.txt"));
        assert!(staged.removed.contains("gone.txt"));

        store.commit("update", "tester").unwrap();
        assert!(store.status().unwrap().is_clean());
    }

    #[test]
    fn deleted_file_survives_until_rm() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "file.txt", "data");
        let store = HistoryStore::init(tmp.path()).unwrap();

        fs::remove_file(tmp.path().join("file.txt")).unwrap();
        store.add_all().unwrap();

        // add_all alone does not stage the deletion
        let status = store.status().unwrap();
        assert!(status.missing.contains("file.txt"));
        assert!(matches!(
            store.commit("nothing staged", "tester"),
            Err(VarchiveError::NothingToCommit)
        ));

        store.rm(["file.txt"]).unwrap();
        store.commit("delete file", "tester").unwrap();
        assert!(store.status().unwrap().is_clean());
    }

    #[test]
    fn read_blob_streams_committed_content() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "doc.txt", "committed bytes");
        let store = HistoryStore::init(tmp.path()).unwrap();

        let commits = store.commits_topo_reversed().unwrap();
        let files = store.read_tree(commits[0].id).unwrap();
        let (_, blob_id) = files.iter().find(|(p, _)| p == "doc.txt").unwrap();

        let mut out = Vec::new();
        store.read_blob(*blob_id, &mut out).unwrap();
        assert_eq!(out, b"committed bytes");
    }

    #[test]
    fn reinit_wipes_history() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "file.txt", "v1");
        let store = HistoryStore::init(tmp.path()).unwrap();

        write(tmp.path(), "file.txt", "v2");
        store.add_all().unwrap();
        store.commit("second", "tester").unwrap();

        let store = HistoryStore::init(tmp.path()).unwrap();
        let commits = store.commits_topo_reversed().unwrap();
        assert_eq!(commits.len(), 1);

        // the fresh root records the current tree
        let files = store.read_tree(commits[0].id).unwrap();
        let mut out = Vec::new();
        store.read_blob(files[0].1, &mut out).unwrap();
        assert_eq!(out, b"v2");
    }

    #[test]
    fn open_requires_existing_store() {
        let tmp = TempDir::new().unwrap();
        assert!(HistoryStore::open(tmp.path()).is_err());

        HistoryStore::init(tmp.path()).unwrap();
        assert!(HistoryStore::open(tmp.path()).is_ok());
    }
}
