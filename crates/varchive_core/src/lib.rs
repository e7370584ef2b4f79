//! varchive core library
//!
//! A *versioned single-file document*: a self-contained archive on disk
//! that internally stores a full revision history of a directory tree.
//! A session treats the archive as if it were a directory: open it, read
//! and write files in the working area, commit snapshots, navigate the
//! revision list, and close it. The archive is the sole unit of
//! persistence; no external repository, server, or command-line tool is
//! required.
//!
//! # Quick start
//!
//! ```no_run
//! use varchive_core::VersionedArchive;
//!
//! let mut vf = VersionedArchive::new("project.vfile")?;
//! vf.create()?;
//! vf.open(true)?;
//!
//! // write and commit a first version
//! std::fs::write(vf.content()?.join("file1.txt"), "hello\n")?;
//! vf.commit("hello added")?;
//!
//! // navigate the history
//! vf.checkout_first_version()?;
//! vf.checkout_latest_version()?;
//!
//! vf.close()?;
//! # Ok::<(), varchive_core::VarchiveError>(())
//! ```
//!
//! # Architecture
//!
//! - [`VersionedArchive`] is the session manager: the lifecycle state
//!   machine with overwrite-safety checks and crash recovery on reopen.
//! - [`HistoryStore`] is the embedded revision store: content-addressed
//!   commits, trees, and blobs inside the working area.
//! - [`ArchiveCodec`] packs a folder into a single file and back; the
//!   default implementation is [`ZipCodec`].
//! - [`set_tmp_folder`] configures the process-wide sandbox base under
//!   which all working areas are allocated.
//!
//! Incremental flushing is not supported: every `flush` repacks the
//! complete archive, so large working trees pay the full packing cost on
//! each flush and close.

mod codec;
mod error;
mod events;
mod history;
mod info;
mod object_id;
mod object_store;
mod policy;
mod refs;
mod registry;
mod session;
mod types;
mod workspace;

pub use codec::{ArchiveCodec, ZipCodec};
pub use error::{Result, VarchiveError};
pub use events::VersionEventListener;
pub use history::{HistoryStore, STORE_DIR};
pub use info::{ArchiveInfo, VersionTag, FORMAT_VERSION, INFO_FILE};
pub use object_id::ObjectId;
pub use object_store::ObjectStore;
pub use policy::{ExclusionSet, PACK_EXCLUDED_ENDINGS};
pub use session::{clear_opened_files_record, ListenerId, VersionedArchive};
pub use types::{Commit, CommitRecord, Tree, TreeEntry, TreeEntryKind, WorkStatus};
pub use workspace::{set_tmp_folder, SandboxBase, SANDBOX_SUFFIX};
