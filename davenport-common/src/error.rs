//! # Error Types
//!
//! Purpose: Define the crate-wide error enum and the mapping from wire
//! status codes to typed errors.
//!
//! ## Design Principles
//! 1. **Total Mapping**: Every non-success wire status resolves to exactly
//!    one variant; unknown codes are preserved, not swallowed.
//! 2. **Retry Classification**: An error knows whether retrying can help.
//! 3. **Source Preservation**: IO and decode failures keep their causes.

use std::time::Duration;

use thiserror::Error;

use crate::types::{MAX_DOC_ID_SIZE, MAX_VALUE_SIZE};
use crate::wire::Status;

/// Result type used across the Davenport crates.
pub type DavResult<T> = Result<T, DavError>;

/// Errors surfaced by the Davenport client.
#[derive(Debug, Error)]
pub enum DavError {
    /// Document id exceeds the wire key field limit.
    #[error("document id exceeds {} bytes", MAX_DOC_ID_SIZE)]
    IdTooLong,
    /// Document id is empty or contains control bytes.
    #[error("invalid document id: {0}")]
    IdInvalid(String),
    /// Serialized document body exceeds the server document limit.
    #[error("document body exceeds {} bytes", MAX_VALUE_SIZE)]
    ValueTooLarge,
    /// Requested document does not exist.
    #[error("document not found: {id}")]
    DocumentNotFound { id: String },
    /// Insert target already exists.
    #[error("document already exists: {id}")]
    DocumentExists { id: String },
    /// A CAS-guarded mutation lost the race.
    #[error("cas mismatch for document: {id}")]
    CasMismatch { id: String },
    /// Credentials were rejected during the handshake.
    #[error("authentication failed")]
    AuthFailed,
    /// The configured bucket does not exist on the cluster.
    #[error("bucket not found: {bucket}")]
    BucketNotFound { bucket: String },
    /// Subdocument path does not exist in the target document.
    #[error("subdocument path not found: {path}")]
    PathNotFound { path: String },
    /// Subdocument insert path already exists.
    #[error("subdocument path already exists: {path}")]
    PathExists { path: String },
    /// Subdocument path exists but has an incompatible type.
    #[error("subdocument path type mismatch: {path}")]
    PathMismatch { path: String },
    /// Subdocument path is not syntactically valid.
    #[error("invalid subdocument path: {path}")]
    PathInvalid { path: String },
    /// Server asked the client to back off and retry.
    #[error("temporary server failure")]
    TempFail,
    /// Server is over capacity; retryable.
    #[error("server busy")]
    Busy,
    /// Server rejected the request arguments.
    #[error("invalid arguments: {reason}")]
    InvalidArgs { reason: String },
    /// Server does not speak the requested protocol revision.
    #[error("unsupported protocol revision")]
    VersionMismatch,
    /// Server did not recognize the opcode.
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    /// Response framing violated the protocol.
    #[error("wire protocol violation: {0}")]
    Protocol(&'static str),
    /// Server returned a status code this client does not know.
    #[error("unknown server status 0x{0:04x}")]
    UnknownStatus(u16),
    /// Document content could not be decoded as the requested type.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// Network or socket failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Pool is at capacity and no idle sessions are available.
    #[error("session pool exhausted")]
    PoolExhausted,
    /// Endpoint could not be parsed or resolved.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Operation exceeded its timeout budget.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl DavError {
    /// Maps a non-success wire status to an error.
    ///
    /// `context` is the document id, path, or bucket name the status refers
    /// to, depending on the operation.
    pub fn from_status(status: Status, context: impl Into<String>) -> DavError {
        let context = context.into();
        match status {
            Status::Ok => DavError::Protocol("success status mapped to error"),
            Status::NotFound => DavError::DocumentNotFound { id: context },
            Status::Exists => DavError::CasMismatch { id: context },
            Status::TooLarge => DavError::ValueTooLarge,
            Status::InvalidArgs => DavError::InvalidArgs { reason: context },
            Status::AuthError => DavError::AuthFailed,
            Status::NoBucket => DavError::BucketNotFound { bucket: context },
            Status::VersionMismatch => DavError::VersionMismatch,
            Status::UnknownCommand => DavError::UnknownCommand(context),
            Status::Busy => DavError::Busy,
            Status::TempFail => DavError::TempFail,
            Status::PathNotFound => DavError::PathNotFound { path: context },
            Status::PathMismatch => DavError::PathMismatch { path: context },
            Status::PathInvalid => DavError::PathInvalid { path: context },
            Status::PathExists => DavError::PathExists { path: context },
            Status::Unknown(code) => DavError::UnknownStatus(code),
        }
    }

    /// Returns true when retrying the operation can succeed.
    ///
    /// IO errors are retryable only for idempotent operations; that refinement
    /// is applied by the dispatcher, which knows the opcode.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DavError::TempFail | DavError::Busy | DavError::Io(_) | DavError::Timeout(_)
        )
    }
}
