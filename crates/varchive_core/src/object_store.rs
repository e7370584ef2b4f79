//! Object storage for the history store.
//!
//! Objects live under a two-level fan-out derived from their id
//! (`objects/ab/cdef...`), zstd-compressed. Readers decode the frame and
//! recompute the hash on every access, so disk corruption is surfaced at
//! the read site instead of leaking into checkouts.

use crate::error::{Result, VarchiveError};
use crate::object_id::{Envelope, ObjectId, PayloadKind};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Compression applied to object files. Commit latency matters more
/// than the last few percent of ratio, so this stays near the fast end.
const PACK_LEVEL: i32 = 3;

/// Content-addressed object storage.
///
/// Identical content maps to one object file regardless of how many
/// revisions reference it, so unchanged files cost nothing per commit.
///
/// # Examples
///
/// ```
/// use varchive_core::ObjectStore;
/// use tempfile::TempDir;
///
/// let dir = TempDir::new().unwrap();
/// let store = ObjectStore::new(dir.path().join("objects"));
///
/// let id = store.put_blob(b"contents").unwrap();
/// assert!(store.contains(id));
/// assert_eq!(store.get_blob(id).unwrap(), b"contents");
/// ```
pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    /// Creates a store rooted at the given directory. Nothing is written
    /// until the first object arrives.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores raw bytes, returning their id. Content the store already
    /// holds is not written again.
    pub fn put_blob(&self, data: &[u8]) -> Result<ObjectId> {
        self.store(Envelope::blob(data))
    }

    /// Fetches a blob by id.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` for an unknown id; `CorruptedObject`,
    /// `HashMismatch`, or `Compression` when the object file is damaged.
    pub fn get_blob(&self, id: ObjectId) -> Result<Vec<u8>> {
        self.load(id, PayloadKind::Blob)
    }

    /// Streams a blob into `out`.
    ///
    /// This is the checkout path: blobs go straight into files of the
    /// working area.
    pub fn copy_blob_to(&self, id: ObjectId, out: &mut dyn Write) -> Result<()> {
        out.write_all(&self.load(id, PayloadKind::Blob)?)?;
        Ok(())
    }

    /// Stores a value through postcard's deterministic encoding, so
    /// equal values always map to equal ids.
    pub fn put_typed<T: Serialize>(&self, value: &T) -> Result<ObjectId> {
        let encoded = postcard::to_allocvec(value)
            .map_err(|e| VarchiveError::Serialization(e.to_string()))?;
        self.store(Envelope::typed(&encoded))
    }

    /// Fetches and decodes a typed object by id.
    pub fn get_typed<T: DeserializeOwned>(&self, id: ObjectId) -> Result<T> {
        let encoded = self.load(id, PayloadKind::Typed)?;
        postcard::from_bytes(&encoded).map_err(|e| VarchiveError::Deserialization(e.to_string()))
    }

    /// Whether the store holds an object with this id.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.path_of(id).exists()
    }

    fn path_of(&self, id: ObjectId) -> PathBuf {
        let (fan_out, name) = id.split_hex();
        self.root.join(fan_out).join(name)
    }

    fn store(&self, envelope: Envelope<'_>) -> Result<ObjectId> {
        let id = envelope.id();

        if self.contains(id) {
            return Ok(id);
        }

        let target = self.path_of(id);
        let parent = target
            .parent()
            .expect("object paths always have a fan-out parent");
        fs::create_dir_all(parent)?;

        let packed = zstd::encode_all(envelope.encode().as_slice(), PACK_LEVEL)
            .map_err(|e| VarchiveError::Compression(e.to_string()))?;

        // Stage beside the target and rename into place: readers never
        // observe a half-written object, and a crash leaves at worst a
        // stale .partial file that a rewrite replaces.
        let staging = target.with_extension("partial");
        {
            let mut out = File::create(&staging)?;
            out.write_all(&packed)?;
            out.sync_all()?;
        }
        fs::rename(&staging, &target)?;
        sync_dir(parent);

        Ok(id)
    }

    fn load(&self, id: ObjectId, want: PayloadKind) -> Result<Vec<u8>> {
        let path = self.path_of(id);

        let packed = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VarchiveError::ObjectNotFound(id.to_hex())
            } else {
                VarchiveError::Io(e)
            }
        })?;

        let framed = zstd::decode_all(packed.as_slice())
            .map_err(|e| VarchiveError::Compression(e.to_string()))?;

        let envelope = Envelope::decode(&framed)
            .map_err(|reason| VarchiveError::CorruptedObject {
                path: path.clone(),
                reason,
            })?;

        let actual = envelope.id();
        if actual != id {
            return Err(VarchiveError::HashMismatch {
                expected: id.to_hex(),
                actual: actual.to_hex(),
            });
        }

        if envelope.kind() != want {
            return Err(VarchiveError::CorruptedObject {
                path,
                reason: format!("holds a {:?} object, expected {:?}", envelope.kind(), want),
            });
        }

        Ok(envelope.payload().to_vec())
    }
}

/// Flushes directory metadata after a rename, where the platform lets
/// us open directories.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
