//! # Cluster and Collection Facade
//!
//! Purpose: Expose a compact, blocking API for document operations against
//! a Davenport cluster.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Cluster` and `Collection` hide pooling, retry,
//!    and framing details.
//! 2. **Typed Boundary**: Content crosses the API as `serde` types; bytes
//!    exist only inside the wire layer.
//! 3. **Validate Early**: Oversized bodies fail before any socket work.

use std::sync::Arc;
use std::time::{Duration, Instant};

use davenport_common::{
    counter_extras, mutation_extras, touch_extras, DavError, DavResult, Document, DocumentId,
    Expiry, Opcode, RequestFrame, DATA_TYPE_JSON, FORMAT_JSON, MAX_VALUE_SIZE,
};
use serde::Serialize;

use crate::config::ClusterConfig;
use crate::dispatch::{DispatchOptions, Dispatcher};
use crate::metrics::MetricsSnapshot;
use crate::options::{CounterOptions, RemoveOptions, StoreOptions};
use crate::pool::{PoolSettings, SessionPool};
use crate::results::{
    decode_counter, decode_document, decode_exists, decode_mutation, decode_query, ensure_ok,
    CounterResult, MutationResult, QueryResult,
};
use crate::subdoc::{LookupInBuilder, MutateInBuilder};

/// Handle to a Davenport cluster.
///
/// Construction validates the configuration and builds the session pool but
/// opens no connections; the first operation dials and authenticates.
pub struct Cluster {
    dispatcher: Arc<Dispatcher>,
}

impl Cluster {
    /// Creates a cluster handle from the configuration.
    pub fn connect(config: ClusterConfig) -> DavResult<Cluster> {
        let pool = SessionPool::new(PoolSettings {
            endpoints: config.endpoints,
            username: config.username,
            password: config.password,
            bucket: config.bucket,
            client_name: config.client_name,
            max_idle: config.max_idle,
            max_total: config.max_total,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        })?;
        let dispatcher = Arc::new(Dispatcher::new(pool, config.retry, config.read_timeout));
        Ok(Cluster { dispatcher })
    }

    /// Returns a handle to the default collection.
    pub fn default_collection(&self) -> Collection {
        Collection {
            dispatcher: self.dispatcher.clone(),
            name: None,
        }
    }

    /// Returns a handle to a named collection.
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            dispatcher: self.dispatcher.clone(),
            name: Some(name.into()),
        }
    }

    /// Round-trips a ping and returns the observed latency.
    pub fn ping(&self) -> DavResult<Duration> {
        let start = Instant::now();
        let mut frame = RequestFrame::new(Opcode::Ping);
        let response = self
            .dispatcher
            .dispatch(&mut frame, &DispatchOptions::default())?;
        ensure_ok(&response, "ping")?;
        Ok(start.elapsed())
    }

    /// Runs a query statement and decodes the rows.
    pub fn query(&self, statement: &str) -> DavResult<QueryResult> {
        let mut frame = RequestFrame::new(Opcode::Query);
        frame.data_type = DATA_TYPE_JSON;
        frame.value = statement.as_bytes().to_vec();
        let response = self
            .dispatcher
            .dispatch(&mut frame, &DispatchOptions::default())?;
        decode_query(response)
    }

    /// Returns a snapshot of the client metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.dispatcher.metrics_snapshot()
    }
}

/// Handle to one collection of documents.
///
/// Cheap to clone; holds only the dispatcher handle and the name.
#[derive(Clone)]
pub struct Collection {
    dispatcher: Arc<Dispatcher>,
    name: Option<String>,
}

impl Collection {
    /// Collection name, or `None` for the default collection.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Fetches a document.
    ///
    /// A missing document is an error; use [`exists`](Self::exists) for
    /// presence checks.
    pub fn get(&self, id: &DocumentId) -> DavResult<Document> {
        let mut frame = RequestFrame::new(Opcode::Get);
        frame.key = self.wire_key(id);
        let response = self
            .dispatcher
            .dispatch(&mut frame, &DispatchOptions::default())?;
        decode_document(id, response)
    }

    /// Checks whether a document exists without fetching it.
    pub fn exists(&self, id: &DocumentId) -> DavResult<bool> {
        let mut frame = RequestFrame::new(Opcode::Exists);
        frame.key = self.wire_key(id);
        let response = self
            .dispatcher
            .dispatch(&mut frame, &DispatchOptions::default())?;
        decode_exists(response, id.as_str())
    }

    /// Stores a document only if it does not exist yet.
    pub fn insert<T: Serialize>(
        &self,
        id: &DocumentId,
        content: &T,
        options: &StoreOptions,
    ) -> DavResult<MutationResult> {
        self.store(Opcode::Insert, id, content, options, false)
    }

    /// Stores a document unconditionally.
    pub fn upsert<T: Serialize>(
        &self,
        id: &DocumentId,
        content: &T,
        options: &StoreOptions,
    ) -> DavResult<MutationResult> {
        self.store(Opcode::Upsert, id, content, options, false)
    }

    /// Replaces an existing document, honoring the CAS guard in `options`.
    pub fn replace<T: Serialize>(
        &self,
        id: &DocumentId,
        content: &T,
        options: &StoreOptions,
    ) -> DavResult<MutationResult> {
        self.store(Opcode::Replace, id, content, options, true)
    }

    fn store<T: Serialize>(
        &self,
        opcode: Opcode,
        id: &DocumentId,
        content: &T,
        options: &StoreOptions,
        with_cas: bool,
    ) -> DavResult<MutationResult> {
        let body = serde_json::to_vec(content)?;
        if body.len() > MAX_VALUE_SIZE {
            return Err(DavError::ValueTooLarge);
        }

        let mut frame = RequestFrame::new(opcode);
        frame.data_type = DATA_TYPE_JSON;
        if with_cas {
            frame.cas = options.cas;
        }
        frame.extras = mutation_extras(FORMAT_JSON, options.expiry.as_secs(), options.durability);
        frame.key = self.wire_key(id);
        frame.value = body;

        let response = self.dispatcher.dispatch(
            &mut frame,
            &DispatchOptions {
                timeout: options.timeout,
            },
        )?;
        decode_mutation(response, id.as_str())
    }

    /// Removes a document, honoring the CAS guard in `options`.
    pub fn remove(&self, id: &DocumentId, options: &RemoveOptions) -> DavResult<MutationResult> {
        let mut frame = RequestFrame::new(Opcode::Remove);
        frame.cas = options.cas;
        frame.extras = mutation_extras(0, 0, options.durability);
        frame.key = self.wire_key(id);
        let response = self.dispatcher.dispatch(
            &mut frame,
            &DispatchOptions {
                timeout: options.timeout,
            },
        )?;
        decode_mutation(response, id.as_str())
    }

    /// Updates a document's expiration without touching its content.
    pub fn touch(&self, id: &DocumentId, expiry: Expiry) -> DavResult<MutationResult> {
        let mut frame = RequestFrame::new(Opcode::Touch);
        frame.extras = touch_extras(expiry.as_secs());
        frame.key = self.wire_key(id);
        let response = self
            .dispatcher
            .dispatch(&mut frame, &DispatchOptions::default())?;
        decode_mutation(response, id.as_str())
    }

    /// Atomically adjusts a numeric document by `delta`.
    ///
    /// With no initial value configured, a missing document fails with
    /// `DocumentNotFound`; the wire encoding carries the do-not-create
    /// sentinel in the expiry field.
    pub fn counter(
        &self,
        id: &DocumentId,
        delta: i64,
        options: &CounterOptions,
    ) -> DavResult<CounterResult> {
        let (initial, expiry_secs) = match options.initial {
            Some(initial) => (initial, options.expiry.as_secs()),
            None => (0, u32::MAX),
        };

        let mut frame = RequestFrame::new(Opcode::Counter);
        frame.extras = counter_extras(delta, initial, expiry_secs);
        frame.key = self.wire_key(id);
        let response = self.dispatcher.dispatch(
            &mut frame,
            &DispatchOptions {
                timeout: options.timeout,
            },
        )?;
        decode_counter(response, id.as_str())
    }

    /// Starts a subdocument multi-lookup on a document.
    pub fn lookup_in(&self, id: &DocumentId) -> LookupInBuilder<'_> {
        LookupInBuilder::new(self, id.clone())
    }

    /// Starts a subdocument multi-mutation on a document.
    pub fn mutate_in(&self, id: &DocumentId) -> MutateInBuilder<'_> {
        MutateInBuilder::new(self, id.clone())
    }

    /// Builds the wire key: collection-qualified ids are prefixed with the
    /// collection name and a NUL separator; the default collection sends
    /// the bare id. Validated ids can never contain the separator.
    pub(crate) fn wire_key(&self, id: &DocumentId) -> Vec<u8> {
        match &self.name {
            Some(name) => {
                let mut key = Vec::with_capacity(name.len() + 1 + id.len());
                key.extend_from_slice(name.as_bytes());
                key.push(0);
                key.extend_from_slice(id.as_bytes());
                key
            }
            None => id.as_bytes().to_vec(),
        }
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
