//! Shared caching: the key-value store port and the response cache built on it.

pub mod response;
pub mod store;

pub use response::{CacheEntry, CacheMarker, CachePolicy, ResponseCache};
pub use store::{KvStore, MemoryStore, StoreError};
