//! # Davenport Client
//!
//! Purpose: Provide a synchronous client for a Davenport document cluster
//! with pooled, authenticated sessions.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse authenticated TCP sessions to avoid
//!    repeated connect/handshake cycles.
//! 2. **Facade Pattern**: `Cluster` and `Collection` hide pooling, retry,
//!    and protocol details behind typed operations.
//! 3. **Fail Fast**: Capacity and protocol violations surface immediately.
//! 4. **Typed Edges**: Wire bytes become `serde`-typed values only at the
//!    public API boundary.

mod collection;
mod config;
mod dispatch;
mod metrics;
mod options;
mod pool;
mod results;
mod subdoc;

pub use collection::{Cluster, Collection};
pub use config::{ClusterConfig, RetryPolicy};
pub use metrics::{LatencySnapshot, MetricsSnapshot};
pub use options::{CounterOptions, RemoveOptions, StoreOptions};
pub use results::{CounterResult, MutationResult, QueryResult};
pub use subdoc::{
    LookupInBuilder, LookupInResult, MutateInBuilder, MutateInResult, SubdocOptions,
};

// Re-export the shared types callers need for every operation.
pub use davenport_common::{
    Cas, DavError, DavResult, Document, DocumentId, Durability, Expiry, PersistTo, ReplicateTo,
};
