//! # Subdocument Operations
//!
//! Purpose: Read and mutate fragments of a document by path without
//! transferring the whole body.
//!
//! ## Design Principles
//! 1. **Builder Pattern**: Specs accumulate fluently and ship as one
//!    multi-spec frame; nothing touches the wire before `execute`.
//! 2. **Deferred Failure**: A fragment that fails to serialize poisons the
//!    builder and surfaces at `execute`, keeping the chain ergonomic.
//! 3. **Per-Spec Outcomes**: A lookup can partially succeed; each result
//!    field carries its own status.
//!
//! Paths use dotted notation with array indices, e.g. `addresses[0].city`.

use std::time::Duration;

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;

use davenport_common::{
    encode_lookup_specs, encode_mutate_specs, lookup_extras, mutate_in_extras,
    parse_subdoc_fields, Cas, DavError, DavResult, DocumentId, Durability, Expiry, LookupOp,
    LookupSpec, MutateOp, MutateSpec, Opcode, RequestFrame, Status, SubdocField,
    MAX_PATH_SIZE, MAX_SUBDOC_SPECS, SUBDOC_DOC_FLAG_ACCESS_DELETED, SUBDOC_DOC_FLAG_ADD,
    SUBDOC_DOC_FLAG_UPSERT, SUBDOC_FLAG_CREATE_PATH, SUBDOC_FLAG_EXPAND_MACROS,
    SUBDOC_FLAG_XATTR,
};

use crate::collection::Collection;
use crate::dispatch::DispatchOptions;

/// Per-spec options for subdocument operations.
#[derive(Default, Debug, Clone, Copy)]
pub struct SubdocOptions {
    /// Create missing intermediate path components (mutations only).
    pub create_path: bool,
    /// Address an extended attribute instead of the document body.
    pub xattr: bool,
    /// Expand server-side macros in the fragment (mutations only).
    pub expand_macros: bool,
}

impl SubdocOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Create missing intermediate path components.
    pub fn create_path(mut self, create_path: bool) -> Self {
        self.create_path = create_path;
        self
    }

    /// Address an extended attribute instead of the document body.
    pub fn xattr(mut self, xattr: bool) -> Self {
        self.xattr = xattr;
        self
    }

    /// Expand server-side macros in the fragment.
    pub fn expand_macros(mut self, expand_macros: bool) -> Self {
        self.expand_macros = expand_macros;
        self
    }

    fn lookup_flags(&self) -> u8 {
        // Only the xattr flag applies to lookups.
        if self.xattr {
            SUBDOC_FLAG_XATTR
        } else {
            0
        }
    }

    fn mutate_flags(&self) -> u8 {
        let mut flags = 0;
        if self.xattr {
            flags |= SUBDOC_FLAG_XATTR;
        }
        if self.create_path {
            flags |= SUBDOC_FLAG_CREATE_PATH;
        }
        if self.expand_macros {
            flags |= SUBDOC_FLAG_EXPAND_MACROS;
        }
        flags
    }
}

fn validate_specs(count: usize) -> DavResult<()> {
    if count == 0 {
        return Err(DavError::InvalidArgs {
            reason: "subdocument operation needs at least one spec".to_string(),
        });
    }
    if count > MAX_SUBDOC_SPECS {
        return Err(DavError::InvalidArgs {
            reason: format!("at most {MAX_SUBDOC_SPECS} specs per operation"),
        });
    }
    Ok(())
}

fn validate_path(path: &str) -> DavResult<()> {
    if path.len() > MAX_PATH_SIZE {
        // Char-wise truncation; a byte slice could split a UTF-8 sequence.
        let mut preview: String = path.chars().take(32).collect();
        preview.push_str("...");
        return Err(DavError::PathInvalid { path: preview });
    }
    Ok(())
}

/// Builder for a subdocument multi-lookup.
///
/// Obtained from [`Collection::lookup_in`]; consumed by `execute`.
pub struct LookupInBuilder<'a> {
    collection: &'a Collection,
    id: DocumentId,
    specs: Vec<LookupSpec>,
    access_deleted: bool,
    timeout: Option<Duration>,
}

impl<'a> LookupInBuilder<'a> {
    pub(crate) fn new(collection: &'a Collection, id: DocumentId) -> Self {
        LookupInBuilder {
            collection,
            id,
            specs: Vec::new(),
            access_deleted: false,
            timeout: None,
        }
    }

    /// Fetches the value at `path`. An empty path fetches the whole
    /// document.
    pub fn get(self, path: impl Into<String>) -> Self {
        self.get_with(path, &SubdocOptions::new())
    }

    /// `get` with explicit options.
    pub fn get_with(mut self, path: impl Into<String>, options: &SubdocOptions) -> Self {
        self.specs.push(LookupSpec {
            op: LookupOp::Get,
            flags: options.lookup_flags(),
            path: path.into(),
        });
        self
    }

    /// Checks whether `path` exists.
    pub fn exists(self, path: impl Into<String>) -> Self {
        self.exists_with(path, &SubdocOptions::new())
    }

    /// `exists` with explicit options.
    pub fn exists_with(mut self, path: impl Into<String>, options: &SubdocOptions) -> Self {
        self.specs.push(LookupSpec {
            op: LookupOp::Exists,
            flags: options.lookup_flags(),
            path: path.into(),
        });
        self
    }

    /// Counts the elements of the array or object at `path`.
    pub fn count(self, path: impl Into<String>) -> Self {
        self.count_with(path, &SubdocOptions::new())
    }

    /// `count` with explicit options.
    pub fn count_with(mut self, path: impl Into<String>, options: &SubdocOptions) -> Self {
        self.specs.push(LookupSpec {
            op: LookupOp::Count,
            flags: options.lookup_flags(),
            path: path.into(),
        });
        self
    }

    /// Also match a deleted (tombstoned) document.
    pub fn access_deleted(mut self, access_deleted: bool) -> Self {
        self.access_deleted = access_deleted;
        self
    }

    /// Overrides the read timeout for this lookup.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends the lookup and decodes the per-spec results.
    pub fn execute(self) -> DavResult<LookupInResult> {
        validate_specs(self.specs.len())?;
        for spec in &self.specs {
            validate_path(&spec.path)?;
        }

        let doc_flags = if self.access_deleted {
            SUBDOC_DOC_FLAG_ACCESS_DELETED
        } else {
            0
        };

        let mut value = BytesMut::new();
        encode_lookup_specs(&self.specs, &mut value);

        let mut frame = RequestFrame::new(Opcode::LookupIn);
        frame.extras = lookup_extras(doc_flags);
        frame.key = self.collection.wire_key(&self.id);
        frame.value = value.to_vec();

        let response = self.collection.dispatcher().dispatch(
            &mut frame,
            &DispatchOptions {
                timeout: self.timeout,
            },
        )?;
        if response.status != Status::Ok {
            return Err(DavError::from_status(response.status, self.id.as_str()));
        }

        let fields = parse_subdoc_fields(&response.value)?;
        if fields.len() != self.specs.len() {
            return Err(DavError::Protocol("subdoc field count mismatch"));
        }

        Ok(LookupInResult {
            cas: response.cas,
            specs: self.specs,
            fields,
        })
    }
}

/// Per-spec results of a multi-lookup.
#[derive(Debug)]
pub struct LookupInResult {
    cas: Cas,
    specs: Vec<LookupSpec>,
    fields: Vec<SubdocField>,
}

impl LookupInResult {
    /// Revision of the document at lookup time.
    pub fn cas(&self) -> Cas {
        self.cas
    }

    /// Number of spec results.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the lookup carried no specs (never for executed lookups).
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Deserializes the value of the spec at `index`.
    pub fn content_as<T: DeserializeOwned>(&self, index: usize) -> DavResult<T> {
        let (spec, field) = self.field(index)?;
        if field.status != Status::Ok {
            return Err(DavError::from_status(field.status, spec.path.clone()));
        }
        Ok(serde_json::from_slice(&field.value)?)
    }

    /// Returns whether the path of the spec at `index` exists.
    pub fn exists(&self, index: usize) -> DavResult<bool> {
        let (spec, field) = self.field(index)?;
        match field.status {
            Status::Ok => Ok(true),
            Status::PathNotFound => Ok(false),
            status => Err(DavError::from_status(status, spec.path.clone())),
        }
    }

    fn field(&self, index: usize) -> DavResult<(&LookupSpec, &SubdocField)> {
        match (self.specs.get(index), self.fields.get(index)) {
            (Some(spec), Some(field)) => Ok((spec, field)),
            _ => Err(DavError::InvalidArgs {
                reason: format!("spec index {index} out of range"),
            }),
        }
    }
}

/// Builder for a subdocument multi-mutation.
///
/// Obtained from [`Collection::mutate_in`]; consumed by `execute`. All
/// specs apply atomically: either the whole mutation commits or none of it
/// does.
pub struct MutateInBuilder<'a> {
    collection: &'a Collection,
    id: DocumentId,
    specs: Vec<MutateSpec>,
    cas: Cas,
    expiry: Expiry,
    durability: Durability,
    doc_flags: u8,
    timeout: Option<Duration>,
    err: Option<DavError>,
}

impl<'a> MutateInBuilder<'a> {
    pub(crate) fn new(collection: &'a Collection, id: DocumentId) -> Self {
        MutateInBuilder {
            collection,
            id,
            specs: Vec::new(),
            cas: Cas::ZERO,
            expiry: Expiry::Never,
            durability: Durability::NONE,
            doc_flags: 0,
            timeout: None,
            err: None,
        }
    }

    /// Replaces the value at an existing `path`.
    pub fn replace<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::Replace, path, Some(value), &SubdocOptions::new())
    }

    /// Adds a dictionary entry at `path`; fails if the path exists.
    pub fn insert<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::DictAdd, path, Some(value), &SubdocOptions::new())
    }

    /// `insert` with explicit options.
    pub fn insert_with<T: Serialize>(
        self,
        path: impl Into<String>,
        value: &T,
        options: &SubdocOptions,
    ) -> Self {
        self.push(MutateOp::DictAdd, path, Some(value), options)
    }

    /// Adds or replaces a dictionary entry at `path`.
    pub fn upsert<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::DictUpsert, path, Some(value), &SubdocOptions::new())
    }

    /// `upsert` with explicit options.
    pub fn upsert_with<T: Serialize>(
        self,
        path: impl Into<String>,
        value: &T,
        options: &SubdocOptions,
    ) -> Self {
        self.push(MutateOp::DictUpsert, path, Some(value), options)
    }

    /// Removes the value at `path`.
    pub fn remove(self, path: impl Into<String>) -> Self {
        self.push::<()>(MutateOp::Delete, path, None, &SubdocOptions::new())
    }

    /// `remove` with explicit options.
    pub fn remove_with(self, path: impl Into<String>, options: &SubdocOptions) -> Self {
        self.push::<()>(MutateOp::Delete, path, None, options)
    }

    /// Adjusts the numeric value at `path` by `delta`.
    pub fn counter(self, path: impl Into<String>, delta: i64) -> Self {
        self.counter_with(path, delta, &SubdocOptions::new())
    }

    /// `counter` with explicit options.
    pub fn counter_with(
        self,
        path: impl Into<String>,
        delta: i64,
        options: &SubdocOptions,
    ) -> Self {
        self.push(MutateOp::Counter, path, Some(&delta), options)
    }

    /// Appends to the array at `path`.
    pub fn array_append<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::ArrayPushLast, path, Some(value), &SubdocOptions::new())
    }

    /// `array_append` with explicit options.
    pub fn array_append_with<T: Serialize>(
        self,
        path: impl Into<String>,
        value: &T,
        options: &SubdocOptions,
    ) -> Self {
        self.push(MutateOp::ArrayPushLast, path, Some(value), options)
    }

    /// Prepends to the array at `path`.
    pub fn array_prepend<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::ArrayPushFirst, path, Some(value), &SubdocOptions::new())
    }

    /// `array_prepend` with explicit options.
    pub fn array_prepend_with<T: Serialize>(
        self,
        path: impl Into<String>,
        value: &T,
        options: &SubdocOptions,
    ) -> Self {
        self.push(MutateOp::ArrayPushFirst, path, Some(value), options)
    }

    /// Inserts at an array index path, e.g. `items[2]`.
    pub fn array_insert<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::ArrayInsert, path, Some(value), &SubdocOptions::new())
    }

    /// Appends only if the value is not already present in the array.
    pub fn array_add_unique<T: Serialize>(self, path: impl Into<String>, value: &T) -> Self {
        self.push(MutateOp::ArrayAddUnique, path, Some(value), &SubdocOptions::new())
    }

    /// Guards the whole mutation on a CAS token.
    pub fn cas(mut self, cas: Cas) -> Self {
        self.cas = cas;
        self
    }

    /// Sets the document expiration applied with the mutation.
    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Sets the durability the server must reach before acknowledging.
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Creates the document if missing; fails if it exists.
    pub fn insert_document(mut self) -> Self {
        self.doc_flags = (self.doc_flags & !SUBDOC_DOC_FLAG_UPSERT) | SUBDOC_DOC_FLAG_ADD;
        self
    }

    /// Creates the document if missing; mutates it if it exists.
    pub fn upsert_document(mut self) -> Self {
        self.doc_flags = (self.doc_flags & !SUBDOC_DOC_FLAG_ADD) | SUBDOC_DOC_FLAG_UPSERT;
        self
    }

    /// Also match a deleted (tombstoned) document.
    pub fn access_deleted(mut self, access_deleted: bool) -> Self {
        if access_deleted {
            self.doc_flags |= SUBDOC_DOC_FLAG_ACCESS_DELETED;
        } else {
            self.doc_flags &= !SUBDOC_DOC_FLAG_ACCESS_DELETED;
        }
        self
    }

    /// Overrides the read timeout for this mutation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn push<T: Serialize>(
        mut self,
        op: MutateOp,
        path: impl Into<String>,
        value: Option<&T>,
        options: &SubdocOptions,
    ) -> Self {
        if self.err.is_some() {
            return self;
        }
        let encoded = match value {
            Some(value) => match serde_json::to_vec(value) {
                Ok(encoded) => encoded,
                Err(err) => {
                    self.err = Some(DavError::Decode(err));
                    return self;
                }
            },
            None => Vec::new(),
        };
        self.specs.push(MutateSpec {
            op,
            flags: options.mutate_flags(),
            path: path.into(),
            value: encoded,
        });
        self
    }

    /// Sends the mutation and returns the new document revision.
    pub fn execute(self) -> DavResult<MutateInResult> {
        if let Some(err) = self.err {
            return Err(err);
        }
        validate_specs(self.specs.len())?;
        for spec in &self.specs {
            validate_path(&spec.path)?;
        }

        let mut value = BytesMut::new();
        encode_mutate_specs(&self.specs, &mut value);

        let mut frame = RequestFrame::new(Opcode::MutateIn);
        frame.cas = self.cas;
        frame.extras = mutate_in_extras(self.doc_flags, self.durability, self.expiry.as_secs());
        frame.key = self.collection.wire_key(&self.id);
        frame.value = value.to_vec();

        let response = self.collection.dispatcher().dispatch(
            &mut frame,
            &DispatchOptions {
                timeout: self.timeout,
            },
        )?;

        if response.status != Status::Ok {
            // On a failed multi-mutation the body names the first failing
            // spec, which gives a better error context than the document id.
            if let Ok(fields) = parse_subdoc_fields(&response.value) {
                for (spec, field) in self.specs.iter().zip(&fields) {
                    if field.status != Status::Ok {
                        return Err(DavError::from_status(field.status, spec.path.clone()));
                    }
                }
            }
            return Err(DavError::from_status(response.status, self.id.as_str()));
        }

        Ok(MutateInResult { cas: response.cas })
    }
}

/// Result of a multi-mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutateInResult {
    cas: Cas,
}

impl MutateInResult {
    /// Revision of the document after the mutation.
    pub fn cas(&self) -> Cas {
        self.cas
    }
}
