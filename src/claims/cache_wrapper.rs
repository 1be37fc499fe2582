//! Cache read-through, outermost link in the C4 chain: a hit short-circuits
//! everything below; a miss falls through and writes the result back as an
//! expirable cache entry (spec §4.4).

use super::{ClaimFinder, ClaimFinderError};
use crate::cache::{CacheError, KvCache};
use crate::hash::Hash;
use crate::model::Claim;
use async_trait::async_trait;

pub struct CacheWrapper<F> {
    inner: F,
    cache: KvCache<Hash, Claim>,
}

impl<F> CacheWrapper<F> {
    pub fn new(inner: F, cache: KvCache<Hash, Claim>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<F> ClaimFinder for CacheWrapper<F>
where
    F: ClaimFinder,
{
    async fn find(&self, claim_id: &Hash, fetch_url: &str) -> Result<Claim, ClaimFinderError> {
        match self.cache.get(claim_id).await {
            Ok(claim) => return Ok(claim),
            Err(CacheError::NotFound) => {}
            Err(e) => return Err(ClaimFinderError::Store(e.to_string())),
        }

        let claim = self.inner.find(claim_id, fetch_url).await?;
        if let Err(e) = self.cache.put(claim_id, &claim, true).await {
            tracing::warn!(error = %e, claim_id = %claim_id, "failed to write fetched claim back to cache");
        }
        Ok(claim)
    }
}
