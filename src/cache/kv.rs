//! Generic expiring key-value cache (spec §4.1 "Generic KV cache").

use super::{CacheError, CacheResult, Codec, KvBackend};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub struct KvCache<K, V> {
    backend: Arc<dyn KvBackend>,
    codec: Arc<dyn Codec<V>>,
    default_expire: Duration,
    /// Prepended to every key before it reaches the backend, so that
    /// distinct `KvCache`s sharing one backend (e.g. several component
    /// caches layered over a single process-wide `KvBackend`) don't
    /// collide on coincidentally-equal key bytes.
    namespace: Vec<u8>,
    _key: PhantomData<K>,
}

impl<K, V> Clone for KvCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            codec: self.codec.clone(),
            default_expire: self.default_expire,
            namespace: self.namespace.clone(),
            _key: PhantomData,
        }
    }
}

impl<K, V> KvCache<K, V>
where
    K: AsRef<[u8]>,
{
    pub fn new(backend: Arc<dyn KvBackend>, codec: Arc<dyn Codec<V>>, default_expire: Duration) -> Self {
        Self {
            backend,
            codec,
            default_expire,
            namespace: Vec::new(),
            _key: PhantomData,
        }
    }

    /// Same as [`Self::new`], but every key is prefixed with `namespace` —
    /// required whenever this cache shares a backend with another cache
    /// keyed over the same byte space.
    pub fn with_namespace(
        backend: Arc<dyn KvBackend>,
        codec: Arc<dyn Codec<V>>,
        default_expire: Duration,
        namespace: &str,
    ) -> Self {
        Self {
            backend,
            codec,
            default_expire,
            namespace: namespace.as_bytes().to_vec(),
            _key: PhantomData,
        }
    }

    fn namespaced_key(&self, key: &K) -> Vec<u8> {
        let mut buf = self.namespace.clone();
        buf.extend_from_slice(key.as_ref());
        buf
    }

    pub async fn put(&self, key: &K, value: &V, expirable: bool) -> CacheResult<()> {
        let bytes = self.codec.encode(value)?;
        self.backend
            .put(&self.namespaced_key(key), bytes, expirable, self.default_expire)
            .await
    }

    /// Returns `Err(CacheError::NotFound)` on miss, matching the spec's
    /// `NOT_FOUND` sentinel (spec §4.1 "get(k) -> v | NOT_FOUND").
    pub async fn get(&self, key: &K) -> CacheResult<V> {
        match self.backend.get(&self.namespaced_key(key)).await? {
            Some(bytes) => self.codec.decode(&bytes),
            None => Err(CacheError::NotFound),
        }
    }

    pub async fn set_expirable(&self, key: &K, expirable: bool) -> CacheResult<()> {
        self.backend
            .set_expirable(&self.namespaced_key(key), expirable, self.default_expire)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;
    use crate::cache::BincodeCodec;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache: KvCache<Vec<u8>, String> = KvCache::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(BincodeCodec),
            Duration::from_secs(60),
        );
        let key = b"k".to_vec();
        cache.put(&key, &"value".to_string(), true).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), "value");
    }

    #[tokio::test]
    async fn miss_is_not_found() {
        let cache: KvCache<Vec<u8>, String> = KvCache::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(BincodeCodec),
            Duration::from_secs(60),
        );
        let key = b"missing".to_vec();
        assert!(matches!(cache.get(&key).await, Err(CacheError::NotFound)));
    }
}
