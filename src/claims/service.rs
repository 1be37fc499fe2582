//! Claim service: the three entry points built atop the finder chain —
//! `get` (cache + store, no network), `cache` (cache only), and `publish`
//! (store + cache) — spec §4.4's service surface above the finder chain.

use super::{ClaimFinderError, ClaimStore};
use crate::cache::KvCache;
use crate::hash::Hash;
use crate::model::Claim;
use std::sync::Arc;

pub struct ClaimService {
    cache: KvCache<Hash, Claim>,
    store: Arc<dyn ClaimStore>,
}

impl ClaimService {
    pub fn new(cache: KvCache<Hash, Claim>, store: Arc<dyn ClaimStore>) -> Self {
        Self { cache, store }
    }

    /// Cache, then store; never touches the network (spec §4.4: "`get`
    /// consults only the cache and the permanent store").
    pub async fn get(&self, claim_id: &Hash) -> Result<Claim, ClaimFinderError> {
        match self.cache.get(claim_id).await {
            Ok(claim) => return Ok(claim),
            Err(crate::cache::CacheError::NotFound) => {}
            Err(e) => return Err(ClaimFinderError::Store(e.to_string())),
        }
        self.store.get(claim_id).await
    }

    /// Cache-only write, used by the finder chain's write-back path and by
    /// callers that want to warm the cache without persisting permanently.
    pub async fn cache(&self, claim: &Claim) -> Result<(), ClaimFinderError> {
        self.cache
            .put(claim.id(), claim, true)
            .await
            .map_err(|e| ClaimFinderError::Store(e.to_string()))
    }

    /// Persist to the permanent store and warm the cache (spec §4.4:
    /// "`publish` writes through to both the store and the cache").
    pub async fn publish(&self, claim: Claim) -> Result<(), ClaimFinderError> {
        self.store.put(claim.clone()).await?;
        self.cache(&claim).await
    }
}
