//! Identity-CID fast path: decode a claim straight out of the hash digest
//! with no network round trip (spec §4.4, §9 "Identity-CID shortcut").

use super::{ClaimArchiveCodec, ClaimFinder, ClaimFinderError};
use crate::hash::Hash;
use crate::model::Claim;
use async_trait::async_trait;
use std::sync::Arc;

pub struct IdentityCidWrapper<F> {
    inner: F,
    codec: Arc<dyn ClaimArchiveCodec>,
}

impl<F> IdentityCidWrapper<F> {
    pub fn new(inner: F, codec: Arc<dyn ClaimArchiveCodec>) -> Self {
        Self { inner, codec }
    }
}

#[async_trait]
impl<F> ClaimFinder for IdentityCidWrapper<F>
where
    F: ClaimFinder,
{
    async fn find(&self, claim_id: &Hash, fetch_url: &str) -> Result<Claim, ClaimFinderError> {
        if let Some(payload) = claim_id.identity_payload() {
            return self.codec.extract_claim(payload);
        }
        self.inner.find(claim_id, fetch_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::BincodeClaimCodec;
    use crate::model::Claim;

    struct UnreachableFetcher;

    #[async_trait]
    impl ClaimFinder for UnreachableFetcher {
        async fn find(&self, _claim_id: &Hash, _fetch_url: &str) -> Result<Claim, ClaimFinderError> {
            panic!("identity-CID path should never delegate to the network fetcher");
        }
    }

    #[tokio::test]
    async fn identity_hash_decodes_without_network_call() {
        let codec = Arc::new(BincodeClaimCodec);
        let claim = Claim::Equals {
            root: Hash::digest(b"root"),
            content_hash: Hash::digest(b"content"),
            equals_cid: Hash::digest(b"equals"),
            expiration: None,
        };
        let encoded = codec.encode_claim(&claim).unwrap();
        let id = Hash::identity(&encoded);
        let wrapper = IdentityCidWrapper::new(UnreachableFetcher, codec);
        let found = wrapper.find(&id, "unused").await.unwrap();
        assert_eq!(found.id(), claim.id());
    }
}
