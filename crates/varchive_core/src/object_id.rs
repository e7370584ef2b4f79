//! Object identity for the history store.
//!
//! Every stored object is framed by an [`Envelope`] before hashing, so
//! an id commits to the payload kind as well as the payload bytes: a
//! blob and a typed object with identical content get distinct ids.

use crate::error::{Result, VarchiveError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a history-store object by the BLAKE3 hash of its framed
/// content.
///
/// Ids double as revision identifiers on the session surface: two
/// archives share a revision exactly when they share its id, which is
/// what the ancestry containment check relies on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 64;

    /// Wraps raw hash bytes.
    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Exposes the raw hash bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Renders the id as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Splits the hex rendering into the two-character fan-out directory
    /// and the remaining file name, mirroring the on-disk object layout
    /// `objects/ab/cdef...`.
    pub fn split_hex(&self) -> (String, String) {
        let hex = self.to_hex();
        let rest = hex[2..].to_string();
        let mut fan_out = hex;
        fan_out.truncate(2);
        (fan_out, rest)
    }

    /// Parses an id from its hex rendering. Surrounding whitespace is
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHex` unless the input is exactly 64 hex digits.
    pub fn from_hex(text: &str) -> Result<Self> {
        let text = text.trim();

        if text.len() != Self::HEX_LEN {
            return Err(VarchiveError::InvalidHex(format!(
                "object id needs {} hex chars, found {}",
                Self::HEX_LEN,
                text.len()
            )));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| VarchiveError::InvalidHex(e.to_string()))?;

        Ok(Self(bytes))
    }

    /// The id a blob payload would get when stored.
    ///
    /// Lets the worktree scanner compare file content against the store
    /// without writing anything.
    pub(crate) fn of_blob(payload: &[u8]) -> Self {
        Envelope::blob(payload).id()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({:.12})", self.to_hex())
    }
}

/// What an [`Envelope`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PayloadKind {
    /// Raw file bytes.
    Blob,
    /// A postcard-encoded store structure (commit or tree).
    Typed,
}

impl PayloadKind {
    fn tag(self) -> u8 {
        match self {
            PayloadKind::Blob => b'B',
            PayloadKind::Typed => b'T',
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'B' => Some(PayloadKind::Blob),
            b'T' => Some(PayloadKind::Typed),
            _ => None,
        }
    }
}

/// Frame header length: magic (4), revision (1), kind tag (1),
/// payload length (8).
const HEADER_LEN: usize = 14;

/// Framing for a stored object: magic, format revision, payload kind,
/// and payload length, followed by the payload itself.
///
/// The frame is what gets hashed and what lands on disk, so readers can
/// tell apart a damaged file, a foreign file, and a payload of the
/// wrong kind before trusting a single byte of content.
pub(crate) struct Envelope<'a> {
    kind: PayloadKind,
    payload: &'a [u8],
}

impl<'a> Envelope<'a> {
    const MAGIC: [u8; 4] = *b"varc";
    const REVISION: u8 = 1;

    /// Frames raw file bytes.
    pub fn blob(payload: &'a [u8]) -> Self {
        Self {
            kind: PayloadKind::Blob,
            payload,
        }
    }

    /// Frames a serialized store structure.
    pub fn typed(payload: &'a [u8]) -> Self {
        Self {
            kind: PayloadKind::Typed,
            payload,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[..4].copy_from_slice(&Self::MAGIC);
        header[4] = Self::REVISION;
        header[5] = self.kind.tag();
        header[6..].copy_from_slice(&(self.payload.len() as u64).to_be_bytes());
        header
    }

    /// Computes the object id without materialising the full frame.
    pub fn id(&self) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.header());
        hasher.update(self.payload);
        ObjectId(*hasher.finalize().as_bytes())
    }

    /// Serialises the frame: header plus payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(self.payload);
        out
    }

    /// Parses a frame, reporting why it is unusable.
    pub fn decode(raw: &'a [u8]) -> std::result::Result<Self, String> {
        if raw.len() < HEADER_LEN {
            return Err(format!("frame shorter than its header ({} bytes)", raw.len()));
        }

        let (header, payload) = raw.split_at(HEADER_LEN);

        if header[..4] != Self::MAGIC {
            return Err("bad magic".to_string());
        }

        if header[4] != Self::REVISION {
            return Err(format!("unsupported frame revision {}", header[4]));
        }

        let kind = PayloadKind::from_tag(header[5])
            .ok_or_else(|| format!("unknown payload tag 0x{:02x}", header[5]))?;

        let declared = u64::from_be_bytes(header[6..].try_into().expect("header tail is 8 bytes"));
        if declared != payload.len() as u64 {
            return Err(format!(
                "header declares {} payload bytes, frame holds {}",
                declared,
                payload.len()
            ));
        }

        Ok(Self { kind, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rendering_round_trips() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8 * 7;
        }

        let id = ObjectId::from_bytes(bytes);
        let parsed = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.as_bytes(), &bytes);
    }

    #[test]
    fn from_hex_checks_length_and_alphabet() {
        assert!(matches!(
            ObjectId::from_hex("ab12"),
            Err(VarchiveError::InvalidHex(_))
        ));
        assert!(matches!(
            ObjectId::from_hex(&"z".repeat(ObjectId::HEX_LEN)),
            Err(VarchiveError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_hex_tolerates_padding() {
        let hex = "7".repeat(ObjectId::HEX_LEN);
        let id = ObjectId::from_hex(&format!("\t{} \n", hex)).unwrap();
        assert_eq!(id.to_hex(), hex);
    }

    #[test]
    fn split_hex_matches_store_layout() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x4f;
        let id = ObjectId::from_bytes(bytes);

        let (fan_out, name) = id.split_hex();
        assert_eq!(fan_out, "4f");
        assert_eq!(name.len(), ObjectId::HEX_LEN - 2);
        assert_eq!(format!("{}{}", fan_out, name), id.to_hex());
    }

    #[test]
    fn ids_commit_to_payload_kind() {
        assert_ne!(Envelope::blob(b"x").id(), Envelope::typed(b"x").id());
    }

    #[test]
    fn ids_are_stable_and_content_sensitive() {
        assert_eq!(Envelope::blob(b"data").id(), Envelope::blob(b"data").id());
        assert_ne!(Envelope::blob(b"data").id(), Envelope::blob(b"date").id());
        assert_eq!(ObjectId::of_blob(b"data"), Envelope::blob(b"data").id());
    }

    #[test]
    fn frames_decode_to_what_was_encoded() {
        let frame = Envelope::typed(b"payload").encode();
        let parsed = Envelope::decode(&frame).unwrap();

        assert_eq!(parsed.kind(), PayloadKind::Typed);
        assert_eq!(parsed.payload(), b"payload");
        assert_eq!(parsed.id(), Envelope::typed(b"payload").id());
    }

    #[test]
    fn empty_payload_frames() {
        let frame = Envelope::blob(b"").encode();
        let parsed = Envelope::decode(&frame).unwrap();
        assert!(parsed.payload().is_empty());
    }

    #[test]
    fn decode_rejects_damaged_frames() {
        assert!(Envelope::decode(b"var").is_err());

        let mut bad_magic = Envelope::blob(b"x").encode();
        bad_magic[0] = b'X';
        assert!(Envelope::decode(&bad_magic).is_err());

        let mut bad_revision = Envelope::blob(b"x").encode();
        bad_revision[4] = 9;
        assert!(Envelope::decode(&bad_revision).is_err());

        let mut bad_tag = Envelope::blob(b"x").encode();
        bad_tag[5] = b'?';
        assert!(Envelope::decode(&bad_tag).is_err());

        let mut truncated = Envelope::blob(b"several bytes").encode();
        truncated.pop();
        assert!(Envelope::decode(&truncated).is_err());
    }

    #[test]
    fn display_is_full_hex_debug_is_short() {
        let id = ObjectId::from_bytes([0xcd; 32]);

        assert_eq!(format!("{}", id), "cd".repeat(32));

        let debug = format!("{:?}", id);
        assert_eq!(debug, "ObjectId(cdcdcdcdcdcd)");
    }
}
