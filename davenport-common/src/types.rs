//! # Document Type Definitions
//!
//! Core data types for Davenport documents, shared between the wire layer
//! and the client facade.
//!
//! ## Design Principles
//!
//! 1. **Bounded Ids**: Document ids are limited to 250 bytes so they always
//!    fit the 16-bit key field of the wire header with room to spare for a
//!    collection prefix.
//!
//! 2. **Opaque Revisions**: The CAS token is a server-issued `u64`. The
//!    client never interprets it, only echoes it back on guarded mutations.
//!
//! 3. **Lossless Expiry**: Expirations are relative durations encoded as
//!    whole seconds on the wire, saturating at `u32::MAX`.
//!
//! 4. **Raw Payloads**: A document body is carried as bytes; typed access
//!    goes through `serde_json` at the edge, never inside the protocol.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{DavError, DavResult};

/// Maximum document id size in bytes.
pub const MAX_DOC_ID_SIZE: usize = 250;

/// Maximum serialized document size in bytes (20 MiB).
pub const MAX_VALUE_SIZE: usize = 20 * 1024 * 1024;

/// Document identifier with a bounded, validated representation.
///
/// Ids are UTF-8, non-empty, at most [`MAX_DOC_ID_SIZE`] bytes, and free of
/// control bytes so they can never be confused with wire framing.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a validated document id.
    ///
    /// # Errors
    /// Returns `DavError::IdInvalid` for empty ids or ids containing control
    /// bytes, and `DavError::IdTooLong` past [`MAX_DOC_ID_SIZE`].
    pub fn new(id: impl Into<String>) -> DavResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DavError::IdInvalid("empty id".to_string()));
        }
        if id.len() > MAX_DOC_ID_SIZE {
            return Err(DavError::IdTooLong);
        }
        if id.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return Err(DavError::IdInvalid(id));
        }
        Ok(DocumentId(id))
    }

    /// Returns the id as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the id bytes as sent on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the id length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the id is empty (never true for validated ids).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({:?})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = DavError;

    fn from_str(s: &str) -> DavResult<Self> {
        DocumentId::new(s)
    }
}

/// Compare-and-swap revision token.
///
/// Issued by the server on every mutation and returned with every read.
/// `Cas::ZERO` on a request means "no CAS check".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cas(pub u64);

impl Cas {
    /// No CAS check.
    pub const ZERO: Cas = Cas(0);

    /// Creates a CAS token from its wire representation.
    #[inline]
    pub const fn new(v: u64) -> Self {
        Cas(v)
    }

    /// Returns the wire representation.
    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns true when this token requests a CAS check.
    #[inline]
    pub const fn is_set(&self) -> bool {
        self.0 != 0
    }
}

/// Document expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Document never expires.
    #[default]
    Never,
    /// Document expires this long after the mutation is applied.
    After(Duration),
}

impl Expiry {
    /// Returns the wire encoding: whole seconds, 0 meaning "never".
    ///
    /// Sub-second durations round up to one second so a short expiry is
    /// never silently dropped; values past `u32::MAX` seconds saturate.
    pub fn as_secs(&self) -> u32 {
        match self {
            Expiry::Never => 0,
            Expiry::After(d) => {
                let secs = d.as_secs();
                if secs == 0 && d.subsec_nanos() > 0 {
                    1
                } else {
                    secs.min(u32::MAX as u64) as u32
                }
            }
        }
    }
}

/// Persistence durability requirement for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistTo {
    /// No persistence requirement.
    #[default]
    None,
    /// Persisted on the active node.
    One,
    /// Persisted on the active node and one replica.
    Two,
    /// Persisted on the active node and two replicas.
    Three,
}

impl PersistTo {
    /// Wire encoding as a single byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        match self {
            PersistTo::None => 0,
            PersistTo::One => 1,
            PersistTo::Two => 2,
            PersistTo::Three => 3,
        }
    }
}

/// Replication durability requirement for a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicateTo {
    /// No replication requirement.
    #[default]
    None,
    /// Replicated to one replica.
    One,
    /// Replicated to two replicas.
    Two,
    /// Replicated to three replicas.
    Three,
}

impl ReplicateTo {
    /// Wire encoding as a single byte.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        match self {
            ReplicateTo::None => 0,
            ReplicateTo::One => 1,
            ReplicateTo::Two => 2,
            ReplicateTo::Three => 3,
        }
    }
}

/// Durability requirement attached to a mutation.
///
/// The server acknowledges the mutation only once both constraints hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Durability {
    /// Persistence constraint.
    pub persist_to: PersistTo,
    /// Replication constraint.
    pub replicate_to: ReplicateTo,
}

impl Durability {
    /// No durability constraints.
    pub const NONE: Durability = Durability {
        persist_to: PersistTo::None,
        replicate_to: ReplicateTo::None,
    };

    /// Builds a durability requirement from both constraints.
    pub const fn new(persist_to: PersistTo, replicate_to: ReplicateTo) -> Self {
        Durability {
            persist_to,
            replicate_to,
        }
    }
}

/// A fetched document: id, revision, and raw payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    /// Validated document id.
    pub id: DocumentId,
    /// Revision at the time of the read.
    pub cas: Cas,
    /// Format flags the document was stored with.
    pub flags: u32,
    /// Raw document payload.
    content: Vec<u8>,
}

impl Document {
    /// Assembles a document from decoded wire parts.
    pub fn from_parts(id: DocumentId, cas: Cas, flags: u32, content: Vec<u8>) -> Self {
        Document {
            id,
            cas,
            flags,
            content,
        }
    }

    /// Returns the raw payload bytes.
    #[inline]
    pub fn content_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Deserializes the payload into a typed value.
    ///
    /// # Errors
    /// Returns `DavError::Decode` if the payload is not valid JSON for `T`.
    pub fn content_as<T: DeserializeOwned>(&self) -> DavResult<T> {
        Ok(serde_json::from_slice(&self.content)?)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("cas", &self.cas)
            .field("flags", &self.flags)
            .field("content_len", &self.content.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_creation() {
        let id = DocumentId::new("user::42").unwrap();
        assert_eq!(id.as_str(), "user::42");
        assert_eq!(id.len(), 8);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_document_id_bounds() {
        let max = "x".repeat(MAX_DOC_ID_SIZE);
        assert!(DocumentId::new(max).is_ok());

        let too_long = "x".repeat(MAX_DOC_ID_SIZE + 1);
        assert!(matches!(DocumentId::new(too_long), Err(DavError::IdTooLong)));

        assert!(matches!(DocumentId::new(""), Err(DavError::IdInvalid(_))));
        assert!(matches!(
            DocumentId::new("bad\nid"),
            Err(DavError::IdInvalid(_))
        ));
    }

    #[test]
    fn test_cas() {
        assert!(!Cas::ZERO.is_set());
        let cas = Cas::new(77);
        assert!(cas.is_set());
        assert_eq!(cas.get(), 77);
    }

    #[test]
    fn test_expiry_encoding() {
        assert_eq!(Expiry::Never.as_secs(), 0);
        assert_eq!(Expiry::After(Duration::from_secs(30)).as_secs(), 30);
        // Sub-second expirations round up instead of becoming "never".
        assert_eq!(Expiry::After(Duration::from_millis(10)).as_secs(), 1);
        // Past the u32 range the encoding saturates.
        let far = Duration::from_secs(u64::from(u32::MAX) + 10);
        assert_eq!(Expiry::After(far).as_secs(), u32::MAX);
    }

    #[test]
    fn test_durability_encoding() {
        let d = Durability::new(PersistTo::Two, ReplicateTo::One);
        assert_eq!(d.persist_to.as_u8(), 2);
        assert_eq!(d.replicate_to.as_u8(), 1);
        assert_eq!(Durability::NONE.persist_to.as_u8(), 0);
    }

    #[test]
    fn test_document_typed_access() {
        let id = DocumentId::new("doc").unwrap();
        let doc = Document::from_parts(id, Cas::new(9), 0x01, br#"{"n":5}"#.to_vec());
        let value: serde_json::Value = doc.content_as().unwrap();
        assert_eq!(value["n"], 5);
        assert!(doc.content_as::<Vec<String>>().is_err());
    }
}
