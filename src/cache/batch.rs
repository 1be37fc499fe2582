//! Batching value-set cache (spec §4.1 "Batching value-set cache").
//!
//! A [`Batch`] defers `add`/`set_expirable` calls and flushes them with
//! [`Batch::commit`]. Flushing is atomic *per key* — each key's deferred ops
//! are applied together — but the batch as a whole is not a transaction: a
//! failure partway through leaves earlier keys committed (spec §4.1:
//! "atomicity across keys is not required... A batch is not a
//! transaction").

use super::{CacheResult, Codec, KvBackend};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

enum PendingOp<V> {
    Add(Vec<V>),
    SetExpirable(bool),
}

pub struct BatchingValueSetCache<K, V> {
    backend: Arc<dyn KvBackend>,
    codec: Arc<dyn Codec<V>>,
    default_expire: Duration,
    /// See [`crate::cache::KvCache`]'s field of the same name. Must match
    /// the namespace of the [`super::ValueSetCache`] this batch's writes are
    /// meant to land in (e.g. the provider index's positive cache).
    namespace: Vec<u8>,
    _key: PhantomData<K>,
}

impl<K, V> BatchingValueSetCache<K, V>
where
    K: AsRef<[u8]> + Clone + Eq + std::hash::Hash,
    V: Clone,
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

    pub fn batch(&self) -> Batch<K, V> {
        Batch {
            backend: self.backend.clone(),
            codec: self.codec.clone(),
            default_expire: self.default_expire,
            namespace: self.namespace.clone(),
            ops: HashMap::new(),
        }
    }
}

pub struct Batch<K, V> {
    backend: Arc<dyn KvBackend>,
    codec: Arc<dyn Codec<V>>,
    default_expire: Duration,
    namespace: Vec<u8>,
    ops: HashMap<K, Vec<PendingOp<V>>>,
}

impl<K, V> Batch<K, V>
where
    K: AsRef<[u8]> + Clone + Eq + std::hash::Hash,
    V: Clone,
{
    pub fn add(&mut self, key: K, values: Vec<V>) {
        self.ops.entry(key).or_default().push(PendingOp::Add(values));
    }

    pub fn set_expirable(&mut self, key: K, expirable: bool) {
        self.ops
            .entry(key)
            .or_default()
            .push(PendingOp::SetExpirable(expirable));
    }

    fn namespaced_key(&self, key: &K) -> Vec<u8> {
        let mut buf = self.namespace.clone();
        buf.extend_from_slice(key.as_ref());
        buf
    }

    /// Flush every key's deferred ops, in per-key encounter order. Each
    /// key's ops apply together; one key's failure does not roll back
    /// another's already-applied ops.
    pub async fn commit(self) -> CacheResult<usize> {
        let mut total_added = 0;
        for (key, ops) in &self.ops {
            let backend_key = self.namespaced_key(key);
            for op in ops {
                match op {
                    PendingOp::Add(values) => {
                        let encoded = values
                            .iter()
                            .map(|v| self.codec.encode(v))
                            .collect::<CacheResult<Vec<_>>>()?;
                        total_added += self
                            .backend
                            .add_members(&backend_key, encoded, true, self.default_expire)
                            .await?;
                    }
                    PendingOp::SetExpirable(expirable) => {
                        self.backend
                            .set_members_expirable(&backend_key, *expirable, self.default_expire)
                            .await?;
                    }
                }
            }
        }
        Ok(total_added)
    }
}
