//! Permanent-store read-through: consult the store before the wrapped
//! finder, falling through to it only on a store miss (spec §4.4). This
//! layer puts the store ahead of the wrapped finder, the mirror image of
//! [`super::cache_wrapper`]'s cache-ahead-of-everything precedence.

use super::{ClaimFinder, ClaimFinderError, ClaimStore};
use crate::hash::Hash;
use crate::model::Claim;
use async_trait::async_trait;
use std::sync::Arc;

pub struct StoreWrapper<F> {
    inner: F,
    store: Arc<dyn ClaimStore>,
}

impl<F> StoreWrapper<F> {
    pub fn new(inner: F, store: Arc<dyn ClaimStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl<F> ClaimFinder for StoreWrapper<F>
where
    F: ClaimFinder,
{
    async fn find(&self, claim_id: &Hash, fetch_url: &str) -> Result<Claim, ClaimFinderError> {
        match self.store.get(claim_id).await {
            Ok(claim) => Ok(claim),
            Err(ClaimFinderError::NotFound) => self.inner.find(claim_id, fetch_url).await,
            Err(e) => Err(e),
        }
    }
}
