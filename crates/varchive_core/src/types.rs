//! Core data types of the history store.

use crate::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A revision: an immutable snapshot of the working tree plus metadata.
///
/// Commits form a linear history in this system; `parents` holds at most
/// one entry, except for the root commit, which has none.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Parent commit ids (empty for the root commit).
    pub parents: Vec<ObjectId>,
    /// Unix timestamp (seconds) when the commit was created.
    pub timestamp_unix: u64,
    /// Author, taken from the current user name at commit time.
    pub author: String,
    /// Commit message.
    pub message: String,
    /// Root tree of this snapshot.
    pub root_tree: ObjectId,
}

/// File hierarchy tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Sorted list of entries (MUST be sorted by name for deterministic ids).
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Creates a new tree, sorting entries by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }
}

/// Entry in a tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Name of the entry (file or directory name, single path segment).
    pub name: String,
    /// Type of entry.
    pub kind: TreeEntryKind,
    /// Id of the content (blob or subtree).
    pub id: ObjectId,
}

/// Type of tree entry.
#[repr(u8)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntryKind {
    /// Regular file (blob).
    Blob = 1,
    /// Directory (subtree).
    Tree = 2,
}

/// A commit as presented to session callers.
///
/// Unlike [`Commit`] this carries its own id, so callers can compare
/// histories without re-hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Content-addressed commit id.
    pub id: ObjectId,
    /// Parent commit ids (empty for the root commit).
    pub parents: Vec<ObjectId>,
    /// Unix timestamp (seconds).
    pub timestamp_unix: u64,
    /// Author name.
    pub author: String,
    /// Commit message.
    pub message: String,
}

/// Working-tree status: sets of paths, relative to the working area,
/// using forward slashes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkStatus {
    /// Staged, not in HEAD.
    pub added: BTreeSet<String>,
    /// Staged with content differing from HEAD.
    pub changed: BTreeSet<String>,
    /// Staged but absent from the working tree.
    pub missing: BTreeSet<String>,
    /// Present in the working tree with content differing from the stage.
    pub modified: BTreeSet<String>,
    /// In HEAD but no longer staged.
    pub removed: BTreeSet<String>,
    /// In the working tree but not staged.
    pub untracked: BTreeSet<String>,
    /// Conflicting paths. Always empty in a linear history; non-empty
    /// means store corruption.
    pub conflicting: BTreeSet<String>,
}

impl WorkStatus {
    /// Returns `true` if no category contains any path.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.missing.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
            && self.untracked.is_empty()
            && self.conflicting.is_empty()
    }

    /// Returns the union of all categories except `conflicting`: the set
    /// of paths with uncommitted changes.
    pub fn all_changes(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        result.extend(self.added.iter().cloned());
        result.extend(self.changed.iter().cloned());
        result.extend(self.missing.iter().cloned());
        result.extend(self.modified.iter().cloned());
        result.extend(self.removed.iter().cloned());
        result.extend(self.untracked.iter().cloned());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_sorts_entries() {
        let tree = Tree::new(vec![
            TreeEntry {
                name: "zebra".into(),
                kind: TreeEntryKind::Blob,
                id: ObjectId::from_bytes([1; 32]),
            },
            TreeEntry {
                name: "alpha".into(),
                kind: TreeEntryKind::Blob,
                id: ObjectId::from_bytes([2; 32]),
            },
        ]);

        assert_eq!(tree.entries[0].name, "alpha");
        assert_eq!(tree.entries[1].name, "zebra");
    }

    #[test]
    fn clean_status() {
        let status = WorkStatus::default();
        assert!(status.is_clean());
        assert!(status.all_changes().is_empty());
    }

    #[test]
    fn all_changes_unions_categories() {
        let mut status = WorkStatus::default();
        status.added.insert("a.txt".into());
        status.missing.insert("b.txt".into());
        status.untracked.insert("c.txt".into());
        status.untracked.insert("a.txt".into());

        assert!(!status.is_clean());
        let all = status.all_changes();
        assert_eq!(all.len(), 3);
        assert!(all.contains("a.txt"));
        assert!(all.contains("b.txt"));
        assert!(all.contains("c.txt"));
    }
}
