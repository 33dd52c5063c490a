//! Key-value store port with per-entry TTL, and its in-memory implementation.
//!
//! Both the response cache and the token→user fast cache sit on this port.
//! The store provides atomic `get`/`put`/`forget`, nothing more: there is no
//! compare-and-swap, and concurrent writers to one key are last-write-wins.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from a key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service could not be reached or refused the operation.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("cache value encoding failed: {0}")]
    Encoding(String),
}

/// Shared key-value cache with TTL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Return the value stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Store `value` under `key` for `ttl`. Returns `false` when the value was
    /// not stored.
    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, StoreError>;

    /// Remove `key`. Returns `true` when an entry was removed.
    async fn forget(&self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Live entries a [`MemoryStore`] holds before refusing new keys.
pub const MAX_ENTRIES: usize = 100_000;

/// In-process [`KvStore`] whose entries expire against an injected clock.
///
/// Expired entries are invisible to readers and are purged on the next write.
/// Once [`MAX_ENTRIES`] live entries are held, writes of new keys fail with
/// [`StoreError::Unavailable`]; existing keys can still be overwritten.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Slot>>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            clock,
            capacity: MAX_ENTRIES,
        }
    }

    #[cfg(test)]
    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::new(clock)
        }
    }

    /// Expiry instant of a live entry.
    #[cfg(test)]
    pub async fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.utc();
        self.inner
            .read()
            .await
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.expires_at)
    }

    /// Number of live entries.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        let now = self.clock.utc();
        self.inner
            .read()
            .await
            .values()
            .filter(|slot| slot.expires_at > now)
            .count()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let now = self.clock.utc();
        let lock = self.inner.read().await;
        Ok(lock
            .get(key)
            .filter(|slot| slot.expires_at > now)
            .map(|slot| slot.value.clone()))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<bool, StoreError> {
        if ttl.is_zero() {
            return Ok(false);
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Encoding(format!("ttl out of range: {e}")))?;
        let now = self.clock.utc();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::Encoding("ttl out of range".into()))?;
        let mut lock = self.inner.write().await;
        lock.retain(|_, slot| slot.expires_at > now);
        if lock.len() >= self.capacity && !lock.contains_key(key) {
            return Err(StoreError::Unavailable(format!(
                "capacity of {} entries reached",
                self.capacity
            )));
        }
        lock.insert(key.to_owned(), Slot { value, expires_at });
        Ok(true)
    }

    async fn forget(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.remove(key).is_some())
    }
}
