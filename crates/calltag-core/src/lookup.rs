//! Identity lookup port
//!
//! The coordinator never knows how a caller is identified. It only asks a
//! [`LookupPort`] for the record matching a phone number and treats every
//! failure as "unknown caller". Retries, caching and networking belong to the
//! port implementation.
//!
//! Three adapters are provided:
//!
//! - [`DirectoryLookup`] - in-memory directory, handy for hosts with a local
//!   customer cache and for tests
//! - [`FnLookupPort`] - wraps an async closure
//! - [`CallbackLookupPort`] - bridges hosts whose lookup API reports through a
//!   one-shot completion callback
//!
//! # Examples
//!
//! ```rust
//! use calltag_core::lookup::{DirectoryLookup, LookupPort};
//! use calltag_core::types::{IdentityRecord, PhoneNumber};
//!
//! # tokio_test::block_on(async {
//! let directory = DirectoryLookup::new();
//! directory.insert(IdentityRecord::new("Jane", "+1555").with_verified(true));
//!
//! let record = directory.lookup(&PhoneNumber::new("+1555")).await.unwrap();
//! assert_eq!(record.unwrap().display_name, "Jane");
//! # });
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use tokio::sync::oneshot;

use crate::error::{CallTagError, CallTagResult};
use crate::types::{IdentityRecord, PhoneNumber};

/// Resolves a phone number to caller identity data
///
/// Implementations may be called concurrently for different numbers and from
/// any task. `Ok(None)` means the caller is unknown; `Err` is handled exactly
/// like `Ok(None)` by the coordinator.
#[async_trait]
pub trait LookupPort: Send + Sync {
    /// Look up the identity behind `phone_number`
    async fn lookup(&self, phone_number: &PhoneNumber) -> CallTagResult<Option<IdentityRecord>>;
}

/// In-memory directory keyed by phone number
#[derive(Debug, Default)]
pub struct DirectoryLookup {
    records: DashMap<String, IdentityRecord>,
}

impl DirectoryLookup {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record, keyed by its own phone number
    pub fn insert(&self, record: IdentityRecord) {
        self.records.insert(record.phone_number.clone(), record);
    }

    /// Remove the record for `phone_number`
    pub fn remove(&self, phone_number: &PhoneNumber) -> Option<IdentityRecord> {
        self.records.remove(phone_number.as_str()).map(|(_, record)| record)
    }

    /// Number of known callers
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl FromIterator<IdentityRecord> for DirectoryLookup {
    fn from_iter<I: IntoIterator<Item = IdentityRecord>>(iter: I) -> Self {
        let directory = Self::new();
        for record in iter {
            directory.insert(record);
        }
        directory
    }
}

#[async_trait]
impl LookupPort for DirectoryLookup {
    async fn lookup(&self, phone_number: &PhoneNumber) -> CallTagResult<Option<IdentityRecord>> {
        Ok(self.records.get(phone_number.as_str()).map(|entry| entry.value().clone()))
    }
}

/// Lookup port backed by an async closure
pub struct FnLookupPort<F> {
    f: F,
}

impl<F, Fut> FnLookupPort<F>
where
    F: Fn(PhoneNumber) -> Fut + Send + Sync,
    Fut: Future<Output = CallTagResult<Option<IdentityRecord>>> + Send,
{
    /// Wrap `f`
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> LookupPort for FnLookupPort<F>
where
    F: Fn(PhoneNumber) -> Fut + Send + Sync,
    Fut: Future<Output = CallTagResult<Option<IdentityRecord>>> + Send,
{
    async fn lookup(&self, phone_number: &PhoneNumber) -> CallTagResult<Option<IdentityRecord>> {
        (self.f)(phone_number.clone()).await
    }
}

/// Completion callback handed to a [`CallbackLookupPort`] implementation
pub type LookupCallback = Box<dyn FnOnce(Option<IdentityRecord>) + Send + 'static>;

/// Lookup port for callback-style host APIs
///
/// The wrapped function receives the number and a callback it must invoke
/// once. Dropping the callback without invoking it is reported as a lookup
/// failure instead of leaving the session waiting.
pub struct CallbackLookupPort<F> {
    f: F,
}

impl<F> CallbackLookupPort<F>
where
    F: Fn(PhoneNumber, LookupCallback) + Send + Sync,
{
    /// Wrap `f`
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> LookupPort for CallbackLookupPort<F>
where
    F: Fn(PhoneNumber, LookupCallback) + Send + Sync,
{
    async fn lookup(&self, phone_number: &PhoneNumber) -> CallTagResult<Option<IdentityRecord>> {
        let (tx, rx) = oneshot::channel();
        let callback: LookupCallback = Box::new(move |record| {
            let _ = tx.send(record);
        });
        (self.f)(phone_number.clone(), callback);
        rx.await
            .map_err(|_| CallTagError::lookup_failure("lookup callback dropped without a result"))
    }
}
