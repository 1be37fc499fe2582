//! Value-set cache for multi-valued keys (spec §4.1 "Value-set cache").

use super::{CacheError, CacheResult, Codec, KvBackend};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub struct ValueSetCache<K, V> {
    backend: Arc<dyn KvBackend>,
    codec: Arc<dyn Codec<V>>,
    default_expire: Duration,
    /// See [`crate::cache::KvCache`]'s field of the same name: distinguishes
    /// this value-set from others sharing the same backend.
    namespace: Vec<u8>,
    _key: PhantomData<K>,
}

impl<K, V> Clone for ValueSetCache<K, V> {
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

impl<K, V> ValueSetCache<K, V>
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

    /// Add `values` to the set at `key`; returns the number newly added
    /// (addition is idempotent on value equality, spec §4.1).
    pub async fn add(&self, key: &K, values: Vec<V>, expirable: bool) -> CacheResult<usize> {
        let encoded = values
            .iter()
            .map(|v| self.codec.encode(v))
            .collect::<CacheResult<Vec<_>>>()?;
        self.backend
            .add_members(&self.namespaced_key(key), encoded, expirable, self.default_expire)
            .await
    }

    /// Returns `Err(CacheError::NotFound)` when the key has never been
    /// populated (spec §4.1 "members(k) -> [v] | NOT_FOUND").
    pub async fn members(&self, key: &K) -> CacheResult<Vec<V>> {
        match self.backend.members(&self.namespaced_key(key)).await? {
            Some(raw) => raw.iter().map(|b| self.codec.decode(b)).collect(),
            None => Err(CacheError::NotFound),
        }
    }

    pub async fn set_expirable(&self, key: &K, expirable: bool) -> CacheResult<()> {
        self.backend
            .set_members_expirable(&self.namespaced_key(key), expirable, self.default_expire)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;
    use crate::cache::BincodeCodec;

    #[tokio::test]
    async fn add_n_times_counts_first_add_only() {
        let cache: ValueSetCache<Vec<u8>, String> = ValueSetCache::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(BincodeCodec),
            Duration::from_secs(60),
        );
        let key = b"hash".to_vec();
        let mut total_added = 0;
        for _ in 0..5 {
            total_added += cache
                .add(&key, vec!["provider-a".to_string()], true)
                .await
                .unwrap();
        }
        assert_eq!(total_added, 1);
        assert_eq!(cache.members(&key).await.unwrap().len(), 1);
    }
}
