//! # Cache substrate (C1)
//!
//! Generic expiring key-value and value-set caches over a pluggable backing
//! store, plus a batching variant of the value-set cache (spec §4.1).
//!
//! The backing store is intentionally an interface (spec §9: "swap in an
//! in-memory map for tests and a sharded networked KV in production").
//! [`memory::InMemoryBackend`] is the `DashMap`-backed test/dev
//! implementation; a networked backend (e.g. over
//! `redis::aio::ConnectionManager`) implements the same [`KvBackend`] trait
//! without requiring any change to [`KvCache`]/[`ValueSetCache`].

pub mod batch;
pub mod kv;
pub mod memory;
pub mod valueset;

pub use batch::{Batch, BatchingValueSetCache};
pub use kv::KvCache;
pub use valueset::ValueSetCache;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("key not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for crate::error::IndexingError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::NotFound => crate::error::IndexingError::KeyNotFound,
            CacheError::Backend(msg) => crate::error::IndexingError::Other(anyhow::anyhow!(msg)),
        }
    }
}

/// User-supplied encode/decode pair for a cache's value type (spec §4.1:
/// "Serialization is parameterized by user-supplied encode/decode functions
/// per cache type").
pub trait Codec<V>: Send + Sync {
    fn encode(&self, value: &V) -> CacheResult<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> CacheResult<V>;
}

/// Default codec backed by `bincode`.
pub struct BincodeCodec;

impl<V> Codec<V> for BincodeCodec
where
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    fn encode(&self, value: &V) -> CacheResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| CacheError::Backend(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> CacheResult<V> {
        bincode::deserialize(bytes).map_err(|e| CacheError::Backend(e.to_string()))
    }
}

/// Byte-oriented backing store abstraction. Every cache shape in this module
/// (`KvCache`, `ValueSetCache`, `BatchingValueSetCache`) is built over this
/// trait so the same logic runs against an in-memory map in tests and a
/// networked KV in production (spec §9).
#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>>;
    async fn put(&self, key: &[u8], value: Vec<u8>, expirable: bool, ttl: Duration) -> CacheResult<()>;
    async fn set_expirable(&self, key: &[u8], expirable: bool, ttl: Duration) -> CacheResult<()>;

    async fn members(&self, key: &[u8]) -> CacheResult<Option<Vec<Vec<u8>>>>;
    /// Idempotent-on-equality add; returns the number of values that were
    /// not already present (spec §4.1 "Addition is idempotent on value
    /// equality").
    async fn add_members(
        &self,
        key: &[u8],
        values: Vec<Vec<u8>>,
        expirable: bool,
        ttl: Duration,
    ) -> CacheResult<usize>;
    async fn set_members_expirable(&self, key: &[u8], expirable: bool, ttl: Duration) -> CacheResult<()>;
}
