//! KeyValueStore trait: the abstract interface for kernel persistence.
//!
//! This trait allows the kernel to be storage-agnostic. Implementations
//! include SQLite (durable) and in-memory (tests and ephemeral clients).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{decode_value, encode_value};
use crate::error::Result;

/// The KeyValueStore trait: async save/load/remove with optional expiry.
///
/// # Expiry
///
/// - `save` with `Some(ttl)` schedules the entry to disappear after `ttl`,
///   replacing any earlier deadline for the same key.
/// - `save` with `None` stores the entry permanently and cancels any
///   pending deadline.
/// - Concurrent writers to the same key are last-write-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Core Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `value` under `key`, optionally expiring after `ttl`.
    async fn save(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()>;

    /// Load the value under `key`, or `None` if absent or expired.
    async fn load(&self, key: &str) -> Result<Option<Bytes>>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn save(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        (**self).save(key, value, ttl).await
    }

    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        (**self).load(key).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
}

/// Extension trait for structured values.
pub trait KeyValueStoreExt: KeyValueStore {
    /// Save a value using the `base64(JSON)` encoding.
    fn save_json<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load and decode a value saved with [`KeyValueStoreExt::save_json`].
    fn load_json<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>>> + Send;
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {
    async fn save_json<T: Serialize + Sync + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let bytes = encode_value(value)?;
        self.save(key, bytes, ttl).await
    }

    async fn load_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.load(key).await? {
            Some(bytes) => decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }
}
