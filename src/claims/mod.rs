//! # Claim finder chain (C4)
//!
//! `find(claim_id, fetch_url) -> Claim` composed via decorators: a simple
//! HTTP fetcher wrapped by an identity-CID fast path, a permanent-store
//! read-through, and a cache read-through (spec §4.4). Each layer tries the
//! next only on a miss, so a cache hit never touches the store and a store
//! hit never touches the network.

pub mod cache_wrapper;
pub mod fetcher;
pub mod identity;
pub mod service;
pub mod store_wrapper;

pub use cache_wrapper::CacheWrapper;
pub use fetcher::SimpleFetcher;
pub use identity::IdentityCidWrapper;
pub use service::ClaimService;
pub use store_wrapper::StoreWrapper;

use crate::hash::Hash;
use crate::model::Claim;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ClaimFinderError {
    #[error("claim fetch failed: {0}")]
    FetchFailed(String),
    #[error("claim fetch returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("fetched claim id {found} does not match requested id {requested}")]
    IdMismatch { requested: String, found: String },
    #[error("claim not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

impl From<ClaimFinderError> for crate::error::IndexingError {
    fn from(e: ClaimFinderError) -> Self {
        match e {
            ClaimFinderError::NotFound => crate::error::IndexingError::KeyNotFound,
            other => crate::error::IndexingError::ClaimFetchError(other.to_string()),
        }
    }
}

/// Decodes a claim out of raw archive bytes (the wire encoding itself is an
/// opaque, out-of-scope codec per spec §1; this trait is the seam a real
/// codec plugs into).
pub trait ClaimArchiveCodec: Send + Sync {
    fn extract_claim(&self, bytes: &[u8]) -> Result<Claim, ClaimFinderError>;
    fn encode_claim(&self, claim: &Claim) -> Result<Vec<u8>, ClaimFinderError>;
}

/// `bincode`-based stand-in codec, sufficient for tests and for services
/// that do not need interoperability with the real UCAN/CAR wire format.
pub struct BincodeClaimCodec;

impl ClaimArchiveCodec for BincodeClaimCodec {
    fn extract_claim(&self, bytes: &[u8]) -> Result<Claim, ClaimFinderError> {
        bincode::deserialize(bytes).map_err(|e| ClaimFinderError::FetchFailed(e.to_string()))
    }

    fn encode_claim(&self, claim: &Claim) -> Result<Vec<u8>, ClaimFinderError> {
        bincode::serialize(claim).map_err(|e| ClaimFinderError::FetchFailed(e.to_string()))
    }
}

/// `find(claimId, fetchURL) -> Claim | error` (spec §4.4).
#[async_trait]
pub trait ClaimFinder: Send + Sync {
    async fn find(&self, claim_id: &Hash, fetch_url: &str) -> Result<Claim, ClaimFinderError>;
}

/// Permanent claim store: created on Publish, never evicted (spec §3
/// Lifecycles).
#[async_trait]
pub trait ClaimStore: Send + Sync {
    async fn get(&self, claim_id: &Hash) -> Result<Claim, ClaimFinderError>;
    async fn put(&self, claim: Claim) -> Result<(), ClaimFinderError>;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use dashmap::DashMap;

    #[derive(Default)]
    pub struct InMemoryClaimStore {
        claims: DashMap<Hash, Claim>,
    }

    #[async_trait]
    impl ClaimStore for InMemoryClaimStore {
        async fn get(&self, claim_id: &Hash) -> Result<Claim, ClaimFinderError> {
            self.claims
                .get(claim_id)
                .map(|c| c.clone())
                .ok_or(ClaimFinderError::NotFound)
        }

        async fn put(&self, claim: Claim) -> Result<(), ClaimFinderError> {
            self.claims.insert(claim.id().clone(), claim);
            Ok(())
        }
    }
}
