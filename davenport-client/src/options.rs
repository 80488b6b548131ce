//! # Operation Options
//!
//! Per-operation knobs, builder-style. Every options struct is
//! `#[non_exhaustive]` so fields can be added without breaking callers.

use std::time::Duration;

use davenport_common::{Cas, Durability, Expiry};

/// Options for `insert` / `upsert` / `replace`.
#[derive(Default, Debug, Clone)]
#[non_exhaustive]
pub struct StoreOptions {
    /// Expiration applied with the mutation.
    pub expiry: Expiry,
    /// Durability the server must reach before acknowledging.
    pub durability: Durability,
    /// CAS guard; honored by `replace` only.
    pub cas: Cas,
    /// Read-timeout override for this operation.
    pub timeout: Option<Duration>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the expiration applied with the mutation.
    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Sets the durability requirement.
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Sets the CAS guard (replace only).
    pub fn cas(mut self, cas: Cas) -> Self {
        self.cas = cas;
        self
    }

    /// Overrides the read timeout for this operation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for `remove`.
#[derive(Default, Debug, Clone)]
#[non_exhaustive]
pub struct RemoveOptions {
    /// CAS guard; the remove fails with a CAS mismatch if the document
    /// changed since the guard was read.
    pub cas: Cas,
    /// Durability the server must reach before acknowledging.
    pub durability: Durability,
    /// Read-timeout override for this operation.
    pub timeout: Option<Duration>,
}

impl RemoveOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the CAS guard.
    pub fn cas(mut self, cas: Cas) -> Self {
        self.cas = cas;
        self
    }

    /// Sets the durability requirement.
    pub fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Overrides the read timeout for this operation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for `counter`.
#[derive(Default, Debug, Clone)]
#[non_exhaustive]
pub struct CounterOptions {
    /// Value to seed a missing document with. With no initial value the
    /// operation fails on a missing document instead of creating it.
    pub initial: Option<u64>,
    /// Expiration applied when the document is created.
    pub expiry: Expiry,
    /// Read-timeout override for this operation.
    pub timeout: Option<Duration>,
}

impl CounterOptions {
    pub fn new() -> Self {
        Default::default()
    }

    /// Seeds a missing document with this value instead of failing.
    pub fn initial(mut self, initial: u64) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Sets the expiration applied on document creation.
    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Overrides the read timeout for this operation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
