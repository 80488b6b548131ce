// davenport-common - Shared types and wire protocol for the Davenport client
//
// This crate defines the binary protocol spoken between the client and a
// Davenport cluster node, plus the error and document types both sides of
// the client crate agree on.

pub mod error;
pub mod types;
pub mod wire;

// Re-export for convenience
pub use error::*;
pub use types::*;
pub use wire::*;
