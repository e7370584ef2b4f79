//! The versioned-file session: lifecycle engine coupling a working area,
//! the embedded history store, and the archive codec.
//!
//! A session treats a single archive file as if it were a directory: open
//! it, read and write files in the working area, commit snapshots,
//! navigate the revision list, and close it. Closing repacks the working
//! area into the archive (after backing up the previous archive file) and
//! removes the sandbox.
//!
//! Do not drive the same archive file through multiple sessions at once;
//! the process-wide registry rejects the attempt within one process, and
//! the sandbox-base lock coordinates cooperating processes.

use crate::codec::{ArchiveCodec, ZipCodec};
use crate::error::{Result, VarchiveError};
use crate::events::VersionEventListener;
use crate::history::HistoryStore;
use crate::info::{ArchiveInfo, INFO_FILE};
use crate::policy::{clean_working_area, ExclusionSet};
use crate::registry;
use crate::types::{CommitRecord, WorkStatus};
use crate::workspace::{self, remove_dir_best_effort};
use crate::ObjectId;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Archive paths successfully opened by this process, ever.
///
/// Only consulted on Windows: a leftover working area there usually means
/// file locking prevented deletion, not a foreign session, so an archive
/// this process opened before may be overwritten without the probe.
static EVER_OPENED: Mutex<Option<HashSet<PathBuf>>> = Mutex::new(None);

fn remember_opened(path: &Path) {
    let mut guard = EVER_OPENED.lock().expect("opened-archives record poisoned");
    guard
        .get_or_insert_with(HashSet::new)
        .insert(path.to_path_buf());
}

fn was_opened_before(path: &Path) -> bool {
    let guard = EVER_OPENED.lock().expect("opened-archives record poisoned");
    guard.as_ref().is_some_and(|set| set.contains(path))
}

/// Commit message recorded when the caller supplies an empty one.
const DEFAULT_COMMIT_MESSAGE: &str = "no message";

/// Attempts to find a collision-free random prefix for the
/// overwrite-safety probe.
const PROBE_ATTEMPTS: u32 = 10;

/// Handle returned by `add_version_event_listener`, used to remove a
/// listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// An archive file with internal version control support.
///
/// ```no_run
/// use varchive_core::VersionedArchive;
///
/// let mut vf = VersionedArchive::new("project.vfile")?;
/// vf.create()?;
/// vf.open(true)?;
///
/// std::fs::write(vf.content()?.join("file1.txt"), "hello")?;
/// vf.commit("first version")?;
///
/// vf.close()?;
/// # Ok::<(), varchive_core::VarchiveError>(())
/// ```
pub struct VersionedArchive {
    /// Absolute path of the archive file.
    archive: PathBuf,
    /// The working area owned by this session.
    sandbox: PathBuf,
    /// Random prefix segment, set only on overwrite-safety probes.
    sandbox_prefix: Option<String>,
    codec: Arc<dyn ArchiveCodec>,
    exclusions: ExclusionSet,
    listeners: Vec<(ListenerId, Box<dyn VersionEventListener>)>,
    next_listener_id: u64,
    /// Commit list cache, invalidated by commits and history rewrites.
    commits: RefCell<Option<Vec<CommitRecord>>>,
    current_version: usize,
    flush_commits: bool,
}

impl VersionedArchive {
    /// Creates a closed session for the given archive path with the
    /// default ZIP codec.
    pub fn new(archive: impl AsRef<Path>) -> Result<Self> {
        Self::with_codec(archive, Arc::new(ZipCodec))
    }

    /// Creates a closed session with a custom archive codec.
    pub fn with_codec(archive: impl AsRef<Path>, codec: Arc<dyn ArchiveCodec>) -> Result<Self> {
        Self::build(archive.as_ref(), None, codec)
    }

    fn build(
        archive: &Path,
        sandbox_prefix: Option<String>,
        codec: Arc<dyn ArchiveCodec>,
    ) -> Result<Self> {
        if archive.as_os_str().is_empty() {
            return Err(VarchiveError::InvalidArgument(
                "archive path is empty".to_string(),
            ));
        }

        let archive = std::path::absolute(archive)?;
        let sandbox =
            workspace::sandbox_base()?.sandbox_for(&archive, sandbox_prefix.as_deref());

        Ok(Self {
            archive,
            sandbox,
            sandbox_prefix,
            codec,
            exclusions: ExclusionSet::new(),
            listeners: Vec::new(),
            next_listener_id: 0,
            commits: RefCell::new(None),
            current_version: 0,
            flush_commits: false,
        })
    }

    /// Returns the archive file path.
    pub fn file(&self) -> &Path {
        &self.archive
    }

    /// Returns the working area of this session.
    ///
    /// Everything placed here is put under version control by the next
    /// commit, except content matching the history store's own files.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` if the session is not opened.
    pub fn content(&self) -> Result<&Path> {
        self.require_opened()?;
        Ok(&self.sandbox)
    }

    /// Determines if this session is opened, i.e. its working area exists.
    pub fn is_opened(&self) -> bool {
        self.sandbox.is_dir()
    }

    /// Determines if the given file exists.
    pub fn exists(file: &Path) -> bool {
        file.exists()
    }

    /// Creates the archive on disk: a fresh working area with a control
    /// record and an empty history, packed and closed immediately.
    ///
    /// # Errors
    ///
    /// Fails if the archive already exists, the sandbox already exists,
    /// another session owns the path, or the sandbox cannot be created.
    pub fn create(&mut self) -> Result<&mut Self> {
        info!(archive = %self.archive.display(), "create archive");

        if !registry::register(&self.archive) {
            return Err(VarchiveError::AlreadyOpen(self.archive.clone()));
        }

        let result = self.create_inner();
        if result.is_err() {
            registry::deregister(&self.archive);
        }
        result?;

        Ok(self)
    }

    fn create_inner(&mut self) -> Result<()> {
        if self.archive.exists() {
            return Err(VarchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("archive already exists: {}", self.archive.display()),
            )));
        }

        if self.sandbox.exists() {
            return Err(VarchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("working area already exists: {}", self.sandbox.display()),
            )));
        }

        fs::create_dir_all(&self.sandbox)?;

        // the control record makes the archive identifiable
        ArchiveInfo::current().save(&self.sandbox)?;

        HistoryStore::init(&self.sandbox)?;

        self.close()
    }

    /// Opens this session: unpacks the archive into the working area,
    /// validates the control record, and optionally checks out the latest
    /// revision.
    ///
    /// # Errors
    ///
    /// Fails with `AlreadyOpen` on a registry conflict or a leftover
    /// working area (non-Windows), `InvalidArchive` if the control record
    /// is missing or malformed (the working area is removed again), and
    /// `Io` if the archive does not exist.
    pub fn open(&mut self, checkout_latest: bool) -> Result<&mut Self> {
        info!(archive = %self.archive.display(), "open archive");

        if !registry::register(&self.archive) {
            return Err(VarchiveError::AlreadyOpen(self.archive.clone()));
        }

        let result = self.open_inner(checkout_latest);
        if result.is_err() {
            registry::deregister(&self.archive);
        }
        result?;

        remember_opened(&self.archive);

        Ok(self)
    }

    fn open_inner(&mut self, checkout_latest: bool) -> Result<()> {
        self.commits.replace(None);

        if !self.archive.exists() {
            return Err(VarchiveError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("archive does not exist: {}", self.archive.display()),
            )));
        }

        if self.is_opened() {
            // Windows file locks are mandatory, so a leftover working
            // area may simply be undeletable; reuse it and let the
            // process-exit cleanup take care of it. Everywhere else a
            // leftover working area means another live session.
            if cfg!(windows) {
                warn!(
                    sandbox = %self.sandbox.display(),
                    "working area already exists, reusing (locked files are removed on exit)"
                );
                return Ok(());
            }
            return Err(VarchiveError::AlreadyOpen(self.archive.clone()));
        }

        if let Err(e) = self.codec.unpack(&self.archive, &self.sandbox) {
            remove_dir_best_effort(&self.sandbox);
            return Err(e);
        }

        match ArchiveInfo::load(&self.sandbox) {
            Ok(Some(_)) => {}
            Ok(None) => {
                remove_dir_best_effort(&self.sandbox);
                return Err(VarchiveError::InvalidArchive {
                    path: self.archive.clone(),
                    reason: "control record missing".to_string(),
                });
            }
            Err(e) => {
                remove_dir_best_effort(&self.sandbox);
                return Err(VarchiveError::InvalidArchive {
                    path: self.archive.clone(),
                    reason: e.to_string(),
                });
            }
        }

        // checkout the latest version to ensure consistency
        if checkout_latest {
            self.checkout_latest_version()?;
        }

        Ok(())
    }

    /// Commit working-area changes as a new revision.
    ///
    /// An empty message is replaced by `"no message"`; the author is the
    /// current user name. If flushing for commits is enabled the archive
    /// is flushed afterwards.
    ///
    /// # Errors
    ///
    /// Fails with `NotOpen` when closed, `Conflicted` if the store
    /// reports conflicts, and `NothingToCommit` when the working area is
    /// unchanged.
    pub fn commit(&mut self, message: &str) -> Result<ObjectId> {
        self.require_opened()?;

        let status = self.status()?;
        if !status.conflicting.is_empty() {
            return Err(VarchiveError::Conflicted(
                status.conflicting.into_iter().collect(),
            ));
        }

        let message = if message.is_empty() {
            DEFAULT_COMMIT_MESSAGE
        } else {
            message
        };

        let store = self.store()?;
        store.rm(&status.missing)?;
        store.add_all()?;
        let commit_id = store.commit(message, &current_user())?;

        self.commits.replace(None);
        self.current_version = self.number_of_versions()?;

        info!(
            version = self.current_version,
            id = %commit_id,
            "committed version"
        );

        if self.flush_commits {
            self.flush()?;
        }

        Ok(commit_id)
    }

    /// Returns all commit records, oldest first, including the private
    /// root commit at index 0.
    pub fn versions(&self) -> Result<Vec<CommitRecord>> {
        self.require_opened()?;

        if let Some(commits) = self.commits.borrow().as_ref() {
            return Ok(commits.clone());
        }

        let commits = self.store()?.commits_topo_reversed()?;
        self.commits.replace(Some(commits.clone()));
        Ok(commits)
    }

    /// Returns the number of user-visible versions.
    ///
    /// Version numbering is 1-based; the root commit is internal and not
    /// counted.
    pub fn number_of_versions(&self) -> Result<usize> {
        Ok(self.versions()?.len().saturating_sub(1))
    }

    /// Returns the number of the currently checked-out version.
    pub fn current_version(&self) -> Result<usize> {
        self.require_opened()?;
        Ok(self.current_version)
    }

    /// Determines whether a version `current + 1` exists.
    pub fn has_next_version(&self) -> Result<bool> {
        Ok(self.current_version()? < self.number_of_versions()?)
    }

    /// Determines whether a version `current - 1` exists. Version
    /// counting starts at 1; version 0 is internal.
    pub fn has_previous_version(&self) -> Result<bool> {
        Ok(self.current_version()? > 1)
    }

    /// Checks out the given version (1-based).
    ///
    /// # Errors
    ///
    /// Fails with `InvalidVersion` if `i` is outside `1..=N`.
    pub fn checkout_version(&mut self, i: usize) -> Result<()> {
        let max = self.number_of_versions()?;

        if i < 1 || i > max {
            return Err(VarchiveError::InvalidVersion { index: i, max });
        }

        info!(version = i, "checkout version");

        let commit = self.versions()?[i].clone();
        self.checkout_commit(&commit)?;
        self.current_version = i;
        Ok(())
    }

    /// Checks out the latest version. No-op on an empty history.
    pub fn checkout_latest_version(&mut self) -> Result<()> {
        let n = self.number_of_versions()?;
        if n >= 1 {
            self.checkout_version(n)?;
        }
        Ok(())
    }

    /// Checks out version 1. No-op on an empty history.
    pub fn checkout_first_version(&mut self) -> Result<()> {
        if self.number_of_versions()? >= 1 {
            self.checkout_version(1)?;
        }
        Ok(())
    }

    /// Checks out the previous version.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidVersion` if no previous version exists.
    pub fn checkout_previous_version(&mut self) -> Result<()> {
        if !self.has_previous_version()? {
            return Err(VarchiveError::InvalidVersion {
                index: self.current_version.wrapping_sub(1),
                max: self.number_of_versions()?,
            });
        }
        self.checkout_version(self.current_version - 1)
    }

    /// Checks out the next version.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidVersion` if no next version exists.
    pub fn checkout_next_version(&mut self) -> Result<()> {
        if !self.has_next_version()? {
            return Err(VarchiveError::InvalidVersion {
                index: self.current_version + 1,
                max: self.number_of_versions()?,
            });
        }
        self.checkout_version(self.current_version + 1)
    }

    /// Materialises the given commit in the working area: listeners fire,
    /// non-excluded files are deleted, then every blob of the commit's
    /// tree is streamed to disk.
    fn checkout_commit(&mut self, commit: &CommitRecord) -> Result<()> {
        for (_, listener) in &self.listeners {
            listener.pre_checkout(commit);
        }

        self.require_opened()?;

        let status = self.status()?;
        if !status.conflicting.is_empty() {
            return Err(VarchiveError::Conflicted(
                status.conflicting.into_iter().collect(),
            ));
        }

        clean_working_area(&self.sandbox, &self.exclusions)?;

        let store = self.store()?;
        for (path, blob_id) in store.read_tree(commit.id)? {
            // the control record is managed by the session, not history
            if path == INFO_FILE {
                continue;
            }

            debug!(path, "checkout file");

            let target = self.sandbox.join(&path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out = BufWriter::new(File::create(&target)?);
            store.read_blob(blob_id, &mut out)?;
        }

        for (_, listener) in &self.listeners {
            listener.post_checkout(commit);
        }

        Ok(())
    }

    /// Returns the paths of all files with uncommitted changes.
    pub fn uncommitted_changes(&self) -> Result<BTreeSet<String>> {
        self.require_opened()?;
        Ok(self.status()?.all_changes())
    }

    /// Returns the paths of all files with uncommitted changes that end
    /// with one of the given endings.
    pub fn uncommitted_changes_matching(&self, endings: &[&str]) -> Result<BTreeSet<String>> {
        Ok(self
            .uncommitted_changes()?
            .into_iter()
            .filter(|path| endings.iter().any(|e| path.ends_with(e)))
            .collect())
    }

    /// Determines whether the working area has changed since the last
    /// commit. Checking out an older version counts as a change.
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(!self.uncommitted_changes()?.is_empty())
    }

    /// Determines whether the history of `other` is contained in this
    /// session's history: every commit id of `other` must be present
    /// here, and this history must be at least as long.
    ///
    /// Both sessions have to be opened.
    pub fn contains(&self, other: &VersionedArchive) -> Result<bool> {
        self.require_opened()?;
        other.require_opened()?;

        if self.number_of_versions()? < other.number_of_versions()? {
            return Ok(false);
        }

        let ours: HashSet<ObjectId> = self.versions()?.iter().map(|c| c.id).collect();

        Ok(other.versions()?.iter().all(|c| ours.contains(&c.id)))
    }

    /// Flushes this session: saves the working area into the archive
    /// file, backing up the previous archive to `<archive>~` first.
    /// No-op when the session is closed.
    ///
    /// # Errors
    ///
    /// A codec failure surfaces as `Codec`; the backup remains in place.
    pub fn flush(&mut self) -> Result<()> {
        if !self.is_opened() {
            return Ok(());
        }

        debug!(archive = %self.archive.display(), "flushing archive");

        if self.archive.exists() {
            let mut backup = self.archive.clone().into_os_string();
            backup.push("~");
            fs::copy(&self.archive, PathBuf::from(backup))?;
        }

        let excludes = self.exclusions.pack_exclusions();
        let excludes: Vec<&str> = excludes.iter().map(String::as_str).collect();

        self.codec.pack(&self.sandbox, &self.archive, &excludes)?;

        Ok(())
    }

    /// Closes this session: flushes all changes to the archive file and
    /// removes the working area. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        info!(archive = %self.archive.display(), "close archive");

        registry::deregister(&self.archive);

        if !self.is_opened() {
            return Ok(());
        }

        self.flush()?;
        self.remove_sandbox();
        Ok(())
    }

    /// Cleans up a session that was left open from a previous run:
    /// closes it if the working area provably contains the history of the
    /// on-disk archive. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails with `OverwriteWouldLoseHistory` if closing would overwrite
    /// revisions only present in the archive.
    pub fn cleanup(&mut self) -> Result<&mut Self> {
        if !self.is_opened() {
            return Ok(self);
        }

        if self.can_close()? {
            self.close()?;
            Ok(self)
        } else {
            Err(VarchiveError::OverwriteWouldLoseHistory(self.archive.clone()))
        }
    }

    /// Overwrite-safety check: proves that the dirty working area's
    /// history is a superset of the on-disk archive's history before the
    /// archive may be overwritten.
    ///
    /// The archive is opened a second time into a random-prefixed probe
    /// sandbox (read-only intent, outside the session registry) and its
    /// commit ids are compared against ours.
    fn can_close(&self) -> Result<bool> {
        // an archive that does not exist yet cannot lose history
        if !self.archive.exists() {
            return Ok(true);
        }

        // a leftover working area on Windows usually means file locking
        // prevented deletion, not a foreign session
        if cfg!(windows) && was_opened_before(&self.archive) {
            return Ok(true);
        }

        if ArchiveInfo::load(&self.sandbox)?.is_none() {
            return Ok(false);
        }

        let mut probe = None;
        for _ in 0..PROBE_ATTEMPTS {
            let prefix = format!(".{}", uuid::Uuid::new_v4());
            let candidate = Self::build(&self.archive, Some(prefix), self.codec.clone())?;
            if !candidate.sandbox.exists() {
                probe = Some(candidate);
                break;
            }
        }

        // exhausting the attempts shouldn't ever happen, but the
        // comparison must fail rather than guess
        let Some(mut probe) = probe else {
            return Ok(false);
        };

        let result = (|| -> Result<bool> {
            probe.open_probe()?;
            self.contains(&probe)
        })();

        probe.discard();

        result
    }

    /// Opens the archive into the probe sandbox without touching the
    /// session registry.
    fn open_probe(&mut self) -> Result<()> {
        self.codec.unpack(&self.archive, &self.sandbox)?;

        if ArchiveInfo::load(&self.sandbox)?.is_none() {
            remove_dir_best_effort(&self.sandbox);
            return Err(VarchiveError::InvalidArchive {
                path: self.archive.clone(),
                reason: "control record missing".to_string(),
            });
        }

        Ok(())
    }

    /// Removes a probe sandbox without flushing.
    fn discard(&mut self) {
        self.remove_sandbox();
    }

    /// Retargets this session to a new archive path: the working area is
    /// copied next to the new location, the old archive is deregistered
    /// (and left in place), and the new archive is written.
    pub fn switch_to_new_archive(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        self.require_opened()?;

        let dest = std::path::absolute(dest.as_ref())?;

        info!(
            from = %self.archive.display(),
            to = %dest.display(),
            "switching archive"
        );

        if !registry::register(&dest) {
            return Err(VarchiveError::AlreadyOpen(dest));
        }

        let new_sandbox = workspace::sandbox_base()?.sandbox_for(&dest, None);

        if new_sandbox != self.sandbox {
            if let Err(e) = copy_dir_recursive(&self.sandbox, &new_sandbox) {
                registry::deregister(&dest);
                return Err(e);
            }
        }

        registry::deregister(&self.archive);

        let old_sandbox = std::mem::replace(&mut self.sandbox, new_sandbox);
        self.archive = dest;

        if old_sandbox != self.sandbox {
            remove_dir_best_effort(&old_sandbox);
        }

        self.flush()
    }

    /// Deletes the complete history of this archive, keeping only the
    /// latest version. Uncommitted changes are lost; this cannot be
    /// undone.
    pub fn delete_history(&mut self) -> Result<()> {
        self.require_opened()?;

        info!(archive = %self.archive.display(), "delete history");

        self.checkout_latest_version()?;

        // re-init records the current tree as the new root
        let store = HistoryStore::init(&self.sandbox)?;
        store.commit_internal("initial commit (cleared history)", &current_user(), true)?;

        self.commits.replace(None);
        self.current_version = self.number_of_versions()?;
        Ok(())
    }

    /// Determines if this file is a valid versioned archive.
    ///
    /// A closed session probes the archive by unpacking it temporarily,
    /// so use this sparingly to avoid unnecessary I/O.
    pub fn is_valid(&self) -> Result<bool> {
        if !self.archive.exists() {
            return Ok(false);
        }

        if self.is_opened() {
            return Ok(ArchiveInfo::load(&self.sandbox)?.is_some());
        }

        let prefix = format!(".{}", uuid::Uuid::new_v4());
        let mut probe = Self::build(&self.archive, Some(prefix), self.codec.clone())?;

        let valid = match probe.open_probe() {
            Ok(()) => true,
            Err(VarchiveError::InvalidArchive { .. }) => false,
            Err(e) => {
                probe.discard();
                return Err(e);
            }
        };

        probe.discard();
        Ok(valid)
    }

    /// Returns the control record of this archive.
    pub fn archive_info(&self) -> Result<ArchiveInfo> {
        self.require_opened()?;

        ArchiveInfo::load(&self.sandbox)?.ok_or_else(|| VarchiveError::InvalidArchive {
            path: self.archive.clone(),
            reason: "control record missing".to_string(),
        })
    }

    /// Registers a checkout event listener and returns its handle.
    pub fn add_version_event_listener(
        &mut self,
        listener: Box<dyn VersionEventListener>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Removes a previously registered checkout event listener.
    pub fn remove_version_event_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    /// Removes all checkout event listeners.
    pub fn remove_all_version_event_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Defines the filename endings excluded from working-area cleanup.
    /// Replaces any previously defined endings.
    pub fn set_exclude_endings_from_cleanup<I, S>(&mut self, endings: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.set_endings(endings);
        self
    }

    /// Excludes the given relative paths from working-area cleanup. Each
    /// call extends the set.
    pub fn exclude_paths_from_cleanup<I, S>(&mut self, paths: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions.add_paths(paths);
        self
    }

    /// Returns whether every commit also flushes the archive.
    pub fn is_flush_commits(&self) -> bool {
        self.flush_commits
    }

    /// Defines whether every commit also flushes the archive.
    pub fn set_flush_commits(&mut self, flush_commits: bool) -> &mut Self {
        self.flush_commits = flush_commits;
        self
    }

    fn require_opened(&self) -> Result<()> {
        if self.is_opened() {
            Ok(())
        } else {
            Err(VarchiveError::NotOpen(self.archive.clone()))
        }
    }

    fn store(&self) -> Result<HistoryStore> {
        HistoryStore::open(&self.sandbox)
    }

    fn status(&self) -> Result<WorkStatus> {
        self.store()?.status()
    }

    /// Removes the working area; a prefixed sandbox takes its prefix
    /// directory with it.
    fn remove_sandbox(&mut self) {
        match &self.sandbox_prefix {
            None => remove_dir_best_effort(&self.sandbox),
            Some(_) => {
                let prefix_dir = self
                    .sandbox
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.sandbox.clone());
                remove_dir_best_effort(&prefix_dir);
            }
        }
    }
}

/// Clears the process-wide record of opened archives.
///
/// Only use this as a workaround when sessions could not be closed
/// properly (e.g. between test runs in one process).
pub fn clear_opened_files_record() {
    registry::clear();
}

/// The author recorded on commits.
fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Recursively copies a directory tree.
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)?;
        }
    }

    Ok(())
}
