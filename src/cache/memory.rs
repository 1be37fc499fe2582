//! In-memory [`KvBackend`] for tests and single-process deployments.
//!
//! Backed by a `dashmap::DashMap` guarded by per-entry expiry metadata. The
//! same map holds both the scalar-value cache and the value-set cache (sets
//! stored as a `DashMap<Vec<u8>, HashSet<...>>` alongside), since each key
//! is used by only one of the two shapes at a time in this crate.

use super::{CacheError, CacheResult, KvBackend};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

struct Entry {
    value: Vec<u8>,
    expirable: bool,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

struct SetEntry {
    values: HashSet<Vec<u8>>,
    expirable: bool,
    expires_at: Option<Instant>,
}

impl SetEntry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    scalars: DashMap<Vec<u8>, Entry>,
    sets: DashMap<Vec<u8>, SetEntry>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn ttl_for(expirable: bool, ttl: Duration) -> Option<Instant> {
        expirable.then(|| Instant::now() + ttl)
    }
}

#[async_trait]
impl KvBackend for InMemoryBackend {
    async fn get(&self, key: &[u8]) -> CacheResult<Option<Vec<u8>>> {
        match self.scalars.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.scalars.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &[u8], value: Vec<u8>, expirable: bool, ttl: Duration) -> CacheResult<()> {
        self.scalars.insert(
            key.to_vec(),
            Entry {
                value,
                expirable,
                expires_at: Self::ttl_for(expirable, ttl),
            },
        );
        Ok(())
    }

    async fn set_expirable(&self, key: &[u8], expirable: bool, ttl: Duration) -> CacheResult<()> {
        if let Some(mut entry) = self.scalars.get_mut(key) {
            entry.expirable = expirable;
            entry.expires_at = Self::ttl_for(expirable, ttl);
            Ok(())
        } else {
            Err(CacheError::NotFound)
        }
    }

    async fn members(&self, key: &[u8]) -> CacheResult<Option<Vec<Vec<u8>>>> {
        match self.sets.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.values.iter().cloned().collect())),
            Some(_) => {
                self.sets.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn add_members(
        &self,
        key: &[u8],
        values: Vec<Vec<u8>>,
        expirable: bool,
        ttl: Duration,
    ) -> CacheResult<usize> {
        let mut entry = self.sets.entry(key.to_vec()).or_insert_with(|| SetEntry {
            values: HashSet::new(),
            expirable,
            expires_at: Self::ttl_for(expirable, ttl),
        });
        let before = entry.values.len();
        for v in values {
            entry.values.insert(v);
        }
        Ok(entry.values.len() - before)
    }

    async fn set_members_expirable(&self, key: &[u8], expirable: bool, ttl: Duration) -> CacheResult<()> {
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.expirable = expirable;
            entry.expires_at = Self::ttl_for(expirable, ttl);
            Ok(())
        } else {
            Err(CacheError::NotFound)
        }
    }
}
