//! Error types for varchive operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for varchive operations.
#[derive(Error, Debug)]
pub enum VarchiveError {
    /// The archive unpacked but carries no (or a malformed) control record.
    #[error("not a valid versioned archive: {}: {}", path.display(), reason)]
    InvalidArchive {
        /// Path to the offending archive file.
        path: PathBuf,
        /// What was missing or malformed.
        reason: String,
    },

    /// Another session in this process already owns the archive path.
    #[error("archive already opened: {}", .0.display())]
    AlreadyOpen(PathBuf),

    /// The operation requires an opened session.
    #[error("archive not opened: {}", .0.display())]
    NotOpen(PathBuf),

    /// Version index outside `1..=N`.
    #[error("version {index} not available (valid range 1..={max})")]
    InvalidVersion {
        /// The requested version index.
        index: usize,
        /// Highest available version number.
        max: usize,
    },

    /// A malformed parameter, e.g. a version string outside the grammar.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `cleanup()` would overwrite an archive whose history the dirty
    /// working area does not contain.
    #[error(
        "cannot overwrite {}: working area does not contain the archive history",
        .0.display()
    )]
    OverwriteWouldLoseHistory(PathBuf),

    /// `set_tmp_folder` was called after the sandbox base was initialised.
    #[error("sandbox base already initialised at {}", .0.display())]
    TmpAlreadyInitialized(PathBuf),

    /// The sandbox-base lock is held by another process.
    #[error("sandbox base locked by another process: {}", .0.display())]
    LockHeld(PathBuf),

    /// The history store reports conflicting paths. Never expected in a
    /// linear history; treated as store corruption.
    #[error("history store has conflicts: {0:?}")]
    Conflicted(Vec<String>),

    /// There is no staged change to commit.
    #[error("nothing to commit")]
    NothingToCommit,

    /// The history store has no HEAD commit.
    #[error("history store has no HEAD")]
    NoHead,

    /// Object with the given id was not found in the store.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Hash verification failed during an object read.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The expected object id.
        expected: String,
        /// The actual computed hash.
        actual: String,
    },

    /// An object file is corrupted or has an invalid envelope.
    #[error("corrupted object at {}: {}", path.display(), reason)]
    CorruptedObject {
        /// Path to the corrupted object.
        path: PathBuf,
        /// Description of the corruption.
        reason: String,
    },

    /// Invalid hex string for an object id.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Serialization of a typed store object failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization of a typed store object failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// The archive codec failed to pack or unpack.
    #[error("codec {identifier} failed: {reason}")]
    Codec {
        /// Codec tag, e.g. `"ZIP"`.
        identifier: &'static str,
        /// What went wrong.
        reason: String,
        /// Underlying cause, when the codec surfaced one.
        #[source]
        source: Option<std::io::Error>,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for varchive operations.
pub type Result<T> = std::result::Result<T, VarchiveError>;
