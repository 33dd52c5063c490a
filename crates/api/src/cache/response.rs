//! Response-level cache: compute once per parameter fingerprint, replay within TTL.
//!
//! Key format: `API:{METHOD}-{short_hash(route)}-{sha1(params)}`.
//!
//! The cache stores the full serialised response (body, status, headers). A
//! hit replays it verbatim, only adding `data_info.cache = "HIT"` when the
//! show-hit marker was requested.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::store::{KvStore, StoreError};
use crate::validation::Params;

/// TTL used when an endpoint does not choose its own.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// How an endpoint wants its responses cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub show_hit: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            show_hit: true,
        }
    }
}

/// Caching activated for one request: the derived key plus the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCache {
    key: String,
    ttl: Duration,
    show_hit: bool,
}

impl ActiveCache {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn show_hit(&self) -> bool {
        self.show_hit
    }
}

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub body: Value,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub show_hit: bool,
}

/// Value of the `data_info.cache` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMarker {
    Hit,
    Miss,
}

impl CacheMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheMarker::Hit => "HIT",
            CacheMarker::Miss => "MISS",
        }
    }
}

/// First 8 hex characters of the SHA-256 of the route template.
pub fn short_hash(route: &str) -> String {
    let digest = Sha256::digest(route.as_bytes());
    hex::encode(&digest[..4])
}

/// SHA-1 hex of the canonical JSON of the validated parameters.
pub fn fingerprint(params: &Params) -> String {
    let canonical = Value::Object(params.as_map().clone()).to_string();
    hex::encode(Sha1::digest(canonical.as_bytes()))
}

/// Deterministic cache key for (method, route template, parameters).
pub fn cache_key(method: &str, route: &str, params: &Params) -> String {
    format!(
        "API:{}-{}-{}",
        method.to_ascii_uppercase(),
        short_hash(route),
        fingerprint(params)
    )
}

/// Add `data_info.cache = marker` to a serialised envelope, keeping any
/// metadata already present.
pub fn inject_marker(body: &mut Value, marker: CacheMarker) {
    let Value::Object(obj) = body else {
        return;
    };
    let info = obj
        .entry("data_info")
        .or_insert_with(|| Value::Object(Map::new()));
    if !info.is_object() {
        *info = Value::Object(Map::new());
    }
    if let Value::Object(info) = info {
        info.insert("cache".into(), Value::String(marker.as_str().into()));
    }
}

/// Response cache over a shared [`KvStore`].
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KvStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Activate caching for a request and derive its key.
    pub fn activate(
        &self,
        method: &str,
        route: &str,
        params: &Params,
        policy: CachePolicy,
    ) -> ActiveCache {
        ActiveCache {
            key: cache_key(method, route, params),
            ttl: policy.ttl,
            show_hit: policy.show_hit,
        }
    }

    /// Return the stored response, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails or the entry cannot be decoded.
    pub async fn lookup(&self, active: &ActiveCache) -> Result<Option<CacheEntry>, StoreError> {
        match self.store.get(&active.key).await? {
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|e| StoreError::Encoding(e.to_string())),
            None => Ok(None),
        }
    }

    /// Persist a response under the active key. `Ok(false)` means the store
    /// declined the write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn store(
        &self,
        active: &ActiveCache,
        body: Value,
        status: u16,
        headers: Vec<(String, String)>,
    ) -> Result<bool, StoreError> {
        let entry = CacheEntry {
            body,
            status,
            headers,
            show_hit: active.show_hit,
        };
        let raw = serde_json::to_value(&entry).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.store.put(&active.key, raw, active.ttl).await
    }
}
