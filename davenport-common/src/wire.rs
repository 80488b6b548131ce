//! # Binary Wire Protocol
//!
//! Purpose: Encode client requests and parse server responses for the
//! Davenport key-value protocol, keeping allocations under control.
//!
//! ## Design Principles
//! 1. **Fixed Header**: Every frame starts with the same 24-byte header so
//!    framing never depends on payload contents.
//! 2. **Buffer Reuse**: Encoding appends to a caller-provided `BytesMut`.
//! 3. **Binary-Safe**: Keys and values are raw bytes end to end.
//! 4. **Fail Fast**: Invalid magic, opcodes, or length fields surface as
//!    protocol errors immediately.
//!
//! ## Frame Layout
//!
//! ```text
//! Header (24 bytes, big-endian):
//! +-------+--------+---------+-----------+----------+----------+
//! | magic | opcode | key_len | extras_len| data_type| status*  |
//! | 1B    | 1B     | 2B      | 1B        | 1B       | 2B       |
//! +-------+--------+---------+-----------+----------+----------+
//! | body_len:4B    | opaque:4B           | cas:8B              |
//! +----------------+---------------------+---------------------+
//! (*) status on responses; reserved (zero) on requests.
//!
//! Body (body_len bytes): extras, then key, then value.
//!
//! Subdoc lookup spec:          Subdoc mutate spec:
//! +----+-------+----------+    +----+-------+----------+-----------+
//! | op | flags | path_len |    | op | flags | path_len | value_len |
//! | 1B | 1B    | 2B       |    | 1B | 1B    | 2B       | 4B        |
//! +----+-------+----------+    +----+-------+----------+-----------+
//! | path...           |        | path... | value...              |
//! +-------------------+        +---------------------------------+
//!
//! Subdoc result field (response value, repeated per spec):
//! +--------+-----------+----------+
//! | status | value_len | value... |
//! | 2B     | 4B        |          |
//! +--------+-----------+----------+
//! ```

use std::io::BufRead;

use bytes::{BufMut, BytesMut};

use crate::error::{DavError, DavResult};
use crate::types::{Cas, Durability};

/// Magic byte opening every request frame.
pub const MAGIC_REQUEST: u8 = 0x80;

/// Magic byte opening every response frame.
pub const MAGIC_RESPONSE: u8 = 0x81;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 24;

/// Protocol revision negotiated via `Hello`.
pub const PROTOCOL_REVISION: u8 = 1;

/// Upper bound on a response body, to bound allocation on a corrupt length.
pub const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Maximum specs in one subdoc multi operation.
pub const MAX_SUBDOC_SPECS: usize = 16;

/// Maximum subdoc path length in bytes.
pub const MAX_PATH_SIZE: usize = 1024;

/// Data type byte: uninterpreted bytes.
pub const DATA_TYPE_RAW: u8 = 0x00;

/// Data type byte: payload is JSON.
pub const DATA_TYPE_JSON: u8 = 0x01;

/// Document format flag stored with JSON documents.
pub const FORMAT_JSON: u32 = 0x01;

/// Subdoc spec flag: path refers to an extended attribute.
pub const SUBDOC_FLAG_XATTR: u8 = 0x01;

/// Subdoc spec flag: create intermediate path components.
pub const SUBDOC_FLAG_CREATE_PATH: u8 = 0x02;

/// Subdoc spec flag: expand server-side macros in the value.
pub const SUBDOC_FLAG_EXPAND_MACROS: u8 = 0x04;

/// Subdoc document flag: create the document if missing (fail if present).
pub const SUBDOC_DOC_FLAG_ADD: u8 = 0x01;

/// Subdoc document flag: create the document if missing (upsert).
pub const SUBDOC_DOC_FLAG_UPSERT: u8 = 0x02;

/// Subdoc document flag: operate on a deleted (tombstoned) document.
pub const SUBDOC_DOC_FLAG_ACCESS_DELETED: u8 = 0x04;

/// Request opcodes understood by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Fetch a document.
    Get,
    /// Store a document unconditionally.
    Upsert,
    /// Store a document only if absent.
    Insert,
    /// Store a document only if present.
    Replace,
    /// Delete a document.
    Remove,
    /// Atomic counter adjustment.
    Counter,
    /// Update expiry without touching content.
    Touch,
    /// Presence check without fetching content.
    Exists,
    /// Run a query statement.
    Query,
    /// Subdocument multi-lookup.
    LookupIn,
    /// Subdocument multi-mutation.
    MutateIn,
    /// Protocol negotiation; first frame on every session.
    Hello,
    /// SASL PLAIN credential presentation.
    Auth,
    /// Bind the session to a bucket.
    SelectBucket,
    /// Liveness probe.
    Ping,
}

impl Opcode {
    /// Wire encoding.
    pub const fn as_u8(&self) -> u8 {
        match self {
            Opcode::Get => 0x00,
            Opcode::Upsert => 0x01,
            Opcode::Insert => 0x02,
            Opcode::Replace => 0x03,
            Opcode::Remove => 0x04,
            Opcode::Counter => 0x05,
            Opcode::Touch => 0x06,
            Opcode::Exists => 0x07,
            Opcode::Query => 0x10,
            Opcode::LookupIn => 0x20,
            Opcode::MutateIn => 0x21,
            Opcode::Hello => 0x40,
            Opcode::Auth => 0x41,
            Opcode::SelectBucket => 0x42,
            Opcode::Ping => 0x43,
        }
    }

    /// Decodes an opcode byte.
    pub const fn from_u8(b: u8) -> Option<Opcode> {
        match b {
            0x00 => Some(Opcode::Get),
            0x01 => Some(Opcode::Upsert),
            0x02 => Some(Opcode::Insert),
            0x03 => Some(Opcode::Replace),
            0x04 => Some(Opcode::Remove),
            0x05 => Some(Opcode::Counter),
            0x06 => Some(Opcode::Touch),
            0x07 => Some(Opcode::Exists),
            0x10 => Some(Opcode::Query),
            0x20 => Some(Opcode::LookupIn),
            0x21 => Some(Opcode::MutateIn),
            0x40 => Some(Opcode::Hello),
            0x41 => Some(Opcode::Auth),
            0x42 => Some(Opcode::SelectBucket),
            0x43 => Some(Opcode::Ping),
            _ => None,
        }
    }

    /// Returns true when the operation can be safely re-sent after a torn
    /// network failure. Mutations are only retried on an explicit retryable
    /// status, never on an IO error.
    pub const fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Opcode::Get
                | Opcode::Exists
                | Opcode::Query
                | Opcode::LookupIn
                | Opcode::Hello
                | Opcode::Auth
                | Opcode::SelectBucket
                | Opcode::Ping
        )
    }
}

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation succeeded.
    Ok,
    /// Document does not exist.
    NotFound,
    /// Document exists / CAS conflict.
    Exists,
    /// Value exceeds the server document limit.
    TooLarge,
    /// Request arguments rejected.
    InvalidArgs,
    /// Credentials rejected.
    AuthError,
    /// Bucket does not exist.
    NoBucket,
    /// Protocol revision not supported.
    VersionMismatch,
    /// Opcode not recognized.
    UnknownCommand,
    /// Server over capacity; retryable.
    Busy,
    /// Transient failure; retryable.
    TempFail,
    /// Subdoc path missing.
    PathNotFound,
    /// Subdoc path type mismatch.
    PathMismatch,
    /// Subdoc path malformed.
    PathInvalid,
    /// Subdoc path already present.
    PathExists,
    /// Any code this client does not know.
    Unknown(u16),
}

impl Status {
    /// Wire encoding.
    pub const fn as_u16(&self) -> u16 {
        match self {
            Status::Ok => 0x0000,
            Status::NotFound => 0x0001,
            Status::Exists => 0x0002,
            Status::TooLarge => 0x0003,
            Status::InvalidArgs => 0x0004,
            Status::AuthError => 0x0020,
            Status::NoBucket => 0x0021,
            Status::VersionMismatch => 0x0022,
            Status::UnknownCommand => 0x0081,
            Status::Busy => 0x0085,
            Status::TempFail => 0x0086,
            Status::PathNotFound => 0x00c0,
            Status::PathMismatch => 0x00c1,
            Status::PathInvalid => 0x00c2,
            Status::PathExists => 0x00c5,
            Status::Unknown(code) => *code,
        }
    }

    /// Decodes a status code. Total: unrecognized codes become `Unknown`.
    pub const fn from_u16(code: u16) -> Status {
        match code {
            0x0000 => Status::Ok,
            0x0001 => Status::NotFound,
            0x0002 => Status::Exists,
            0x0003 => Status::TooLarge,
            0x0004 => Status::InvalidArgs,
            0x0020 => Status::AuthError,
            0x0021 => Status::NoBucket,
            0x0022 => Status::VersionMismatch,
            0x0081 => Status::UnknownCommand,
            0x0085 => Status::Busy,
            0x0086 => Status::TempFail,
            0x00c0 => Status::PathNotFound,
            0x00c1 => Status::PathMismatch,
            0x00c2 => Status::PathInvalid,
            0x00c5 => Status::PathExists,
            code => Status::Unknown(code),
        }
    }

    /// Returns true when the server asked for a back-off and retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Status::Busy | Status::TempFail)
    }
}

/// One request frame, header fields plus body sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    /// Operation to perform.
    pub opcode: Opcode,
    /// Data type of the value section.
    pub data_type: u8,
    /// Correlation id; assigned by the session, echoed by the server.
    pub opaque: u32,
    /// CAS guard (`Cas::ZERO` for unguarded requests).
    pub cas: Cas,
    /// Operation-specific extras section.
    pub extras: Vec<u8>,
    /// Key section (document id, mechanism name, bucket name...).
    pub key: Vec<u8>,
    /// Value section.
    pub value: Vec<u8>,
}

impl RequestFrame {
    /// Creates an empty frame for the opcode.
    pub fn new(opcode: Opcode) -> Self {
        RequestFrame {
            opcode,
            data_type: DATA_TYPE_RAW,
            opaque: 0,
            cas: Cas::ZERO,
            extras: Vec::new(),
            key: Vec::new(),
            value: Vec::new(),
        }
    }
}

/// One parsed response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Opcode echoed from the request.
    pub opcode: Opcode,
    /// Outcome of the operation.
    pub status: Status,
    /// Data type of the value section.
    pub data_type: u8,
    /// Correlation id echoed from the request.
    pub opaque: u32,
    /// Document revision after the operation.
    pub cas: Cas,
    /// Operation-specific extras section.
    pub extras: Vec<u8>,
    /// Key section (usually empty on responses).
    pub key: Vec<u8>,
    /// Value section.
    pub value: Vec<u8>,
}

/// Encodes one request frame into the provided buffer.
///
/// Section sizes are bounded by construction (ids are validated, extras are
/// built by the helpers below), so encoding is infallible.
pub fn encode_request(frame: &RequestFrame, out: &mut BytesMut) {
    debug_assert!(frame.key.len() <= u16::MAX as usize);
    debug_assert!(frame.extras.len() <= u8::MAX as usize);

    let body_len = frame.extras.len() + frame.key.len() + frame.value.len();
    out.reserve(HEADER_SIZE + body_len);

    out.put_u8(MAGIC_REQUEST);
    out.put_u8(frame.opcode.as_u8());
    out.put_u16(frame.key.len() as u16);
    out.put_u8(frame.extras.len() as u8);
    out.put_u8(frame.data_type);
    out.put_u16(0); // reserved on requests
    out.put_u32(body_len as u32);
    out.put_u32(frame.opaque);
    out.put_u64(frame.cas.get());
    out.put_slice(&frame.extras);
    out.put_slice(&frame.key);
    out.put_slice(&frame.value);
}

/// Reads exactly one response frame from the buffered reader.
pub fn read_response<R: BufRead>(reader: &mut R) -> DavResult<ResponseFrame> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    if header[0] != MAGIC_RESPONSE {
        return Err(DavError::Protocol("bad response magic"));
    }
    let opcode = Opcode::from_u8(header[1]).ok_or(DavError::Protocol("unknown opcode"))?;
    let key_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    let extras_len = header[4] as usize;
    let data_type = header[5];
    let status = Status::from_u16(u16::from_be_bytes([header[6], header[7]]));
    let body_len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let opaque = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
    let cas = Cas::new(u64::from_be_bytes([
        header[16], header[17], header[18], header[19], header[20], header[21], header[22],
        header[23],
    ]));

    if body_len > MAX_FRAME_SIZE {
        return Err(DavError::Protocol("response body exceeds frame limit"));
    }
    if body_len < extras_len + key_len {
        return Err(DavError::Protocol("response sections exceed body length"));
    }

    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body)?;

    let value = body.split_off(extras_len + key_len);
    let key = body.split_off(extras_len);
    let extras = body;

    Ok(ResponseFrame {
        opcode,
        status,
        data_type,
        opaque,
        cas,
        extras,
        key,
        value,
    })
}

/// Builds the extras section for full-document mutations:
/// format flags, expiry seconds, durability bytes.
pub fn mutation_extras(flags: u32, expiry_secs: u32, durability: Durability) -> Vec<u8> {
    let mut extras = Vec::with_capacity(10);
    extras.extend_from_slice(&flags.to_be_bytes());
    extras.extend_from_slice(&expiry_secs.to_be_bytes());
    extras.push(durability.persist_to.as_u8());
    extras.push(durability.replicate_to.as_u8());
    extras
}

/// Builds the extras section for counter operations:
/// signed delta, initial value, expiry seconds.
pub fn counter_extras(delta: i64, initial: u64, expiry_secs: u32) -> Vec<u8> {
    let mut extras = Vec::with_capacity(20);
    extras.extend_from_slice(&delta.to_be_bytes());
    extras.extend_from_slice(&initial.to_be_bytes());
    extras.extend_from_slice(&expiry_secs.to_be_bytes());
    extras
}

/// Builds the extras section for touch operations: expiry seconds.
pub fn touch_extras(expiry_secs: u32) -> Vec<u8> {
    expiry_secs.to_be_bytes().to_vec()
}

/// Builds the extras section for subdoc lookups: document flags.
pub fn lookup_extras(doc_flags: u8) -> Vec<u8> {
    vec![doc_flags]
}

/// Builds the extras section for subdoc mutations:
/// document flags, durability bytes, expiry seconds.
pub fn mutate_in_extras(doc_flags: u8, durability: Durability, expiry_secs: u32) -> Vec<u8> {
    let mut extras = Vec::with_capacity(7);
    extras.push(doc_flags);
    extras.push(durability.persist_to.as_u8());
    extras.push(durability.replicate_to.as_u8());
    extras.extend_from_slice(&expiry_secs.to_be_bytes());
    extras
}

/// Subdocument lookup operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOp {
    /// Fetch the value at a path (empty path fetches the whole document).
    Get,
    /// Check whether a path exists.
    Exists,
    /// Count the elements of an array or object at a path.
    Count,
}

impl LookupOp {
    /// Wire encoding.
    pub const fn as_u8(&self) -> u8 {
        match self {
            LookupOp::Get => 0x00,
            LookupOp::Exists => 0x01,
            LookupOp::Count => 0x02,
        }
    }
}

/// Subdocument mutation operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateOp {
    /// Replace the value at an existing path.
    Replace,
    /// Add a dictionary entry; fails if the path exists.
    DictAdd,
    /// Add or replace a dictionary entry.
    DictUpsert,
    /// Remove the value at a path.
    Delete,
    /// Adjust a numeric value at a path by a signed delta.
    Counter,
    /// Append to the array at a path.
    ArrayPushLast,
    /// Prepend to the array at a path.
    ArrayPushFirst,
    /// Insert at an array index path (e.g. `items[2]`).
    ArrayInsert,
    /// Append only if the value is not already in the array.
    ArrayAddUnique,
}

impl MutateOp {
    /// Wire encoding.
    pub const fn as_u8(&self) -> u8 {
        match self {
            MutateOp::Replace => 0x00,
            MutateOp::DictAdd => 0x01,
            MutateOp::DictUpsert => 0x02,
            MutateOp::Delete => 0x03,
            MutateOp::Counter => 0x04,
            MutateOp::ArrayPushLast => 0x05,
            MutateOp::ArrayPushFirst => 0x06,
            MutateOp::ArrayInsert => 0x07,
            MutateOp::ArrayAddUnique => 0x08,
        }
    }
}

/// One encoded lookup spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSpec {
    /// Lookup kind.
    pub op: LookupOp,
    /// Spec flags (`SUBDOC_FLAG_*`).
    pub flags: u8,
    /// Target path within the document.
    pub path: String,
}

/// One encoded mutation spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutateSpec {
    /// Mutation kind.
    pub op: MutateOp,
    /// Spec flags (`SUBDOC_FLAG_*`).
    pub flags: u8,
    /// Target path within the document.
    pub path: String,
    /// Serialized fragment (empty for `Delete`).
    pub value: Vec<u8>,
}

/// Encodes lookup specs into a request value section.
pub fn encode_lookup_specs(specs: &[LookupSpec], out: &mut BytesMut) {
    for spec in specs {
        debug_assert!(spec.path.len() <= MAX_PATH_SIZE);
        out.put_u8(spec.op.as_u8());
        out.put_u8(spec.flags);
        out.put_u16(spec.path.len() as u16);
        out.put_slice(spec.path.as_bytes());
    }
}

/// Encodes mutation specs into a request value section.
pub fn encode_mutate_specs(specs: &[MutateSpec], out: &mut BytesMut) {
    for spec in specs {
        debug_assert!(spec.path.len() <= MAX_PATH_SIZE);
        out.put_u8(spec.op.as_u8());
        out.put_u8(spec.flags);
        out.put_u16(spec.path.len() as u16);
        out.put_u32(spec.value.len() as u32);
        out.put_slice(spec.path.as_bytes());
        out.put_slice(&spec.value);
    }
}

/// One per-spec result field from a subdoc response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdocField {
    /// Outcome for this spec.
    pub status: Status,
    /// Result value (empty on mutations and failed lookups).
    pub value: Vec<u8>,
}

/// Parses the per-spec result fields of a subdoc response body.
pub fn parse_subdoc_fields(body: &[u8]) -> DavResult<Vec<SubdocField>> {
    let mut fields = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        if rest.len() < 6 {
            return Err(DavError::Protocol("truncated subdoc field header"));
        }
        let status = Status::from_u16(u16::from_be_bytes([rest[0], rest[1]]));
        let len = u32::from_be_bytes([rest[2], rest[3], rest[4], rest[5]]) as usize;
        rest = &rest[6..];
        if rest.len() < len {
            return Err(DavError::Protocol("truncated subdoc field value"));
        }
        fields.push(SubdocField {
            status,
            value: rest[..len].to_vec(),
        });
        rest = &rest[len..];
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn response_bytes(
        opcode: Opcode,
        status: Status,
        opaque: u32,
        cas: u64,
        extras: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(MAGIC_RESPONSE);
        out.push(opcode.as_u8());
        out.extend_from_slice(&(key.len() as u16).to_be_bytes());
        out.push(extras.len() as u8);
        out.push(DATA_TYPE_RAW);
        out.extend_from_slice(&status.as_u16().to_be_bytes());
        let body_len = (extras.len() + key.len() + value.len()) as u32;
        out.extend_from_slice(&body_len.to_be_bytes());
        out.extend_from_slice(&opaque.to_be_bytes());
        out.extend_from_slice(&cas.to_be_bytes());
        out.extend_from_slice(extras);
        out.extend_from_slice(key);
        out.extend_from_slice(value);
        out
    }

    #[test]
    fn encodes_get_request() {
        let mut frame = RequestFrame::new(Opcode::Get);
        frame.opaque = 7;
        frame.key = b"doc-1".to_vec();
        let mut buf = BytesMut::new();
        encode_request(&frame, &mut buf);

        let expected: &[u8] = &[
            0x80, 0x00, // magic, opcode
            0x00, 0x05, // key_len
            0x00, 0x00, // extras_len, data_type
            0x00, 0x00, // reserved
            0x00, 0x00, 0x00, 0x05, // body_len
            0x00, 0x00, 0x00, 0x07, // opaque
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // cas
            b'd', b'o', b'c', b'-', b'1',
        ];
        assert_eq!(&buf[..], expected);
    }

    #[test]
    fn parses_ok_response() {
        let bytes = response_bytes(
            Opcode::Get,
            Status::Ok,
            7,
            42,
            &[0, 0, 0, 1],
            b"",
            br#"{"a":1}"#,
        );
        let mut reader = Cursor::new(bytes);
        let frame = read_response(&mut reader).unwrap();
        assert_eq!(frame.opcode, Opcode::Get);
        assert_eq!(frame.status, Status::Ok);
        assert_eq!(frame.opaque, 7);
        assert_eq!(frame.cas, Cas::new(42));
        assert_eq!(frame.extras, vec![0, 0, 0, 1]);
        assert_eq!(frame.value, br#"{"a":1}"#.to_vec());
    }

    #[test]
    fn parses_error_status() {
        let bytes = response_bytes(Opcode::Get, Status::NotFound, 1, 0, &[], b"", b"");
        let mut reader = Cursor::new(bytes);
        let frame = read_response(&mut reader).unwrap();
        assert_eq!(frame.status, Status::NotFound);
        assert!(frame.value.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = response_bytes(Opcode::Get, Status::Ok, 1, 0, &[], b"", b"");
        bytes[0] = 0x42;
        let mut reader = Cursor::new(bytes);
        assert!(matches!(
            read_response(&mut reader),
            Err(DavError::Protocol(_))
        ));
    }

    #[test]
    fn rejects_oversized_body() {
        let mut bytes = response_bytes(Opcode::Get, Status::Ok, 1, 0, &[], b"", b"");
        bytes[8..12].copy_from_slice(&(MAX_FRAME_SIZE as u32 + 1).to_be_bytes());
        let mut reader = Cursor::new(bytes);
        assert!(matches!(
            read_response(&mut reader),
            Err(DavError::Protocol(_))
        ));
    }

    #[test]
    fn rejects_sections_exceeding_body() {
        let mut bytes = response_bytes(Opcode::Get, Status::Ok, 1, 0, &[], b"", b"");
        // Claim a key longer than the whole body.
        bytes[2..4].copy_from_slice(&100u16.to_be_bytes());
        let mut reader = Cursor::new(bytes);
        assert!(matches!(
            read_response(&mut reader),
            Err(DavError::Protocol(_))
        ));
    }

    #[test]
    fn rejects_truncated_frame() {
        let bytes = response_bytes(Opcode::Get, Status::Ok, 1, 0, &[], b"", b"abc");
        let mut reader = Cursor::new(bytes[..HEADER_SIZE + 1].to_vec());
        assert!(matches!(read_response(&mut reader), Err(DavError::Io(_))));
    }

    #[test]
    fn opcode_roundtrip() {
        let all = [
            Opcode::Get,
            Opcode::Upsert,
            Opcode::Insert,
            Opcode::Replace,
            Opcode::Remove,
            Opcode::Counter,
            Opcode::Touch,
            Opcode::Exists,
            Opcode::Query,
            Opcode::LookupIn,
            Opcode::MutateIn,
            Opcode::Hello,
            Opcode::Auth,
            Opcode::SelectBucket,
            Opcode::Ping,
        ];
        for op in all {
            assert_eq!(Opcode::from_u8(op.as_u8()), Some(op));
        }
        assert_eq!(Opcode::from_u8(0xff), None);
    }

    #[test]
    fn status_unknown_fallback() {
        assert_eq!(Status::from_u16(0x0000), Status::Ok);
        assert_eq!(Status::from_u16(0x7777), Status::Unknown(0x7777));
        assert_eq!(Status::Unknown(0x7777).as_u16(), 0x7777);
        assert!(Status::TempFail.is_retryable());
        assert!(Status::Busy.is_retryable());
        assert!(!Status::NotFound.is_retryable());
    }

    #[test]
    fn mutation_extras_layout() {
        let extras = mutation_extras(FORMAT_JSON, 300, Durability::NONE);
        assert_eq!(extras.len(), 10);
        assert_eq!(&extras[0..4], &[0, 0, 0, 1]);
        assert_eq!(&extras[4..8], &300u32.to_be_bytes());
        assert_eq!(&extras[8..10], &[0, 0]);
    }

    #[test]
    fn counter_extras_layout() {
        let extras = counter_extras(-2, 10, 60);
        assert_eq!(extras.len(), 20);
        assert_eq!(&extras[0..8], &(-2i64).to_be_bytes());
        assert_eq!(&extras[8..16], &10u64.to_be_bytes());
        assert_eq!(&extras[16..20], &60u32.to_be_bytes());
    }

    #[test]
    fn lookup_specs_encode() {
        let specs = vec![
            LookupSpec {
                op: LookupOp::Get,
                flags: 0,
                path: "name".to_string(),
            },
            LookupSpec {
                op: LookupOp::Exists,
                flags: SUBDOC_FLAG_XATTR,
                path: "meta.rev".to_string(),
            },
        ];
        let mut buf = BytesMut::new();
        encode_lookup_specs(&specs, &mut buf);

        let expected: &[u8] = &[
            0x00, 0x00, 0x00, 0x04, b'n', b'a', b'm', b'e', //
            0x01, 0x01, 0x00, 0x08, b'm', b'e', b't', b'a', b'.', b'r', b'e', b'v',
        ];
        assert_eq!(&buf[..], expected);
    }

    #[test]
    fn mutate_specs_encode() {
        let specs = vec![MutateSpec {
            op: MutateOp::DictUpsert,
            flags: SUBDOC_FLAG_CREATE_PATH,
            path: "a.b".to_string(),
            value: b"1".to_vec(),
        }];
        let mut buf = BytesMut::new();
        encode_mutate_specs(&specs, &mut buf);

        let expected: &[u8] = &[
            0x02, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, b'a', b'.', b'b', b'1',
        ];
        assert_eq!(&buf[..], expected);
    }

    #[test]
    fn subdoc_fields_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(&Status::Ok.as_u16().to_be_bytes());
        body.extend_from_slice(&3u32.to_be_bytes());
        body.extend_from_slice(b"abc");
        body.extend_from_slice(&Status::PathNotFound.as_u16().to_be_bytes());
        body.extend_from_slice(&0u32.to_be_bytes());

        let fields = parse_subdoc_fields(&body).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].status, Status::Ok);
        assert_eq!(fields[0].value, b"abc".to_vec());
        assert_eq!(fields[1].status, Status::PathNotFound);
        assert!(fields[1].value.is_empty());
    }

    #[test]
    fn subdoc_fields_reject_truncation() {
        let mut body = Vec::new();
        body.extend_from_slice(&Status::Ok.as_u16().to_be_bytes());
        body.extend_from_slice(&9u32.to_be_bytes());
        body.extend_from_slice(b"abc");
        assert!(matches!(
            parse_subdoc_fields(&body),
            Err(DavError::Protocol(_))
        ));
    }
}
