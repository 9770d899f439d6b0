//! In-memory implementation of the KeyValueStore trait.
//!
//! Entries saved with a TTL get a spawned tokio timer that evicts them when
//! the deadline passes. Loads also check the deadline, so an entry is never
//! observed after it expired even if its timer has not fired yet. Deadlines
//! use `tokio::time::Instant`, which lets tests drive expiry with a paused
//! clock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::KeyValueStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
/// Cloning yields another handle to the same entries.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    entries: HashMap<String, Entry>,

    /// Bumped on every write so a stale timer never evicts a newer value.
    generation: u64,
}

struct Entry {
    value: Bytes,
    deadline: Option<Instant>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.map(|deadline| now < deadline).unwrap_or(true)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner::default())),
        }
    }

    /// Number of entries physically held, including expired ones whose
    /// eviction has not run yet.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the eviction timer for `key`, if a runtime is available.
///
/// Without a runtime the entry still disappears from `load` at its deadline;
/// it is only dropped from memory on the next write to the same key.
fn spawn_eviction(
    inner: Weak<RwLock<MemoryStoreInner>>,
    key: String,
    deadline: Instant,
    generation: u64,
) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        tokio::time::sleep_until(deadline).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let Ok(mut guard) = inner.write() else {
            return;
        };
        let current = guard
            .entries
            .get(&key)
            .map(|entry| entry.generation == generation)
            .unwrap_or(false);
        if current {
            guard.entries.remove(&key);
            debug!(key = %key, "evicted expired entry");
        }
    }))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn save(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.write()?;
        inner.generation += 1;
        let generation = inner.generation;

        if let Some(previous) = inner.entries.get_mut(key) {
            previous.cancel_timer();
        }

        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        let timer = deadline.and_then(|deadline| {
            spawn_eviction(
                Arc::downgrade(&self.inner),
                key.to_string(),
                deadline,
                generation,
            )
        });

        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                deadline,
                generation,
                timer,
            },
        );
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Bytes>> {
        let inner = self.read()?;
        let now = Instant::now();
        Ok(inner
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(mut entry) = inner.entries.remove(key) {
            entry.cancel_timer();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(600_000);

    #[tokio::test]
    async fn test_save_load_remove() {
        let store = MemoryStore::new();
        assert!(store.load("a").await.unwrap().is_none());

        store.save("a", Bytes::from_static(b"1"), None).await.unwrap();
        assert_eq!(store.load("a").await.unwrap().unwrap(), Bytes::from_static(b"1"));

        store.remove("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());

        // Removing again is fine.
        store.remove("a").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_entry_expires() {
        let store = MemoryStore::new();
        store.save("k", Bytes::from_static(b"v"), Some(TTL)).await.unwrap();

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert!(store.load("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(store.load("k").await.unwrap().is_none());

        // Let the eviction timer run.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_without_ttl_cancels_expiry() {
        let store = MemoryStore::new();
        store.save("k", Bytes::from_static(b"v"), Some(TTL)).await.unwrap();

        tokio::time::advance(TTL / 2).await;
        store.save("k", Bytes::from_static(b"v"), None).await.unwrap();

        tokio::time::advance(TTL * 3).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.load("k").await.unwrap().unwrap(), Bytes::from_static(b"v"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resave_with_ttl_replaces_deadline() {
        let store = MemoryStore::new();
        store.save("k", Bytes::from_static(b"1"), Some(TTL)).await.unwrap();

        tokio::time::advance(TTL / 2).await;
        store.save("k", Bytes::from_static(b"2"), Some(TTL)).await.unwrap();

        // Past the first deadline, before the second.
        tokio::time::advance(TTL * 3 / 4).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.load("k").await.unwrap().unwrap(), Bytes::from_static(b"2"));

        tokio::time::advance(TTL).await;
        assert!(store.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save("k", Bytes::from_static(b"v"), None).await.unwrap();
        assert!(other.load("k").await.unwrap().is_some());
    }
}
