//! Legacy claims adapter (spec §4.6.4): given a hash, a legacy mapper
//! supplies historical claim CIDs, which are fetched and synthesized into
//! provider results per claim kind. Bucket-key parsing itself is out of
//! scope (spec §1); only the in-scope synthesis logic lives here.

use crate::claims::ClaimStore;
use crate::error::IndexingError;
use crate::hash::{ContextId, Hash};
use crate::model::{ClaimMetadata, Claim, ProviderAddress, ProviderResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Supplies the ordered list of historical claim CIDs for a hash. Concrete
/// bucket-key parsing is external (spec §1 Non-goals); only this narrow
/// seam is modeled.
#[async_trait]
pub trait LegacyClaimMapper: Send + Sync {
    async fn legacy_claim_cids(&self, hash: &Hash) -> Result<Vec<Hash>, IndexingError>;
}

/// Address of the service's own claims endpoint, appended as a trailing
/// provider address for synthesized location results (spec §4.6.4).
pub struct LegacyAdapter {
    mapper: Arc<dyn LegacyClaimMapper>,
    store: Arc<dyn ClaimStore>,
    claims_service_address: ProviderAddress,
}

impl LegacyAdapter {
    pub fn new(
        mapper: Arc<dyn LegacyClaimMapper>,
        store: Arc<dyn ClaimStore>,
        claims_service_address: ProviderAddress,
    ) -> Self {
        Self {
            mapper,
            store,
            claims_service_address,
        }
    }

    pub async fn find(&self, hash: &Hash) -> Result<Vec<ProviderResult>, IndexingError> {
        let claim_cids = self.mapper.legacy_claim_cids(hash).await?;
        let mut results = Vec::with_capacity(claim_cids.len());
        for claim_cid in claim_cids {
            let claim = match self.store.get(&claim_cid).await {
                Ok(claim) => claim,
                Err(e) => return Err(e.into()),
            };
            match self.synthesize(&claim) {
                Some(result) => results.push(result),
                // Unsupported claim kinds are logged and filtered
                // (spec §4.6.4: "IGNORE_FILTERED").
                None => tracing::warn!(claim_id = %claim.id(), "ignoring unsupported legacy claim kind"),
            }
        }
        Ok(results)
    }

    fn synthesize(&self, claim: &Claim) -> Option<ProviderResult> {
        match claim {
            Claim::Location {
                root,
                content_hash,
                urls,
                range,
                space,
                expiration,
                ..
            } => {
                let context_id = ContextId::derive(space.as_deref(), content_hash);
                let metadata = ClaimMetadata::LocationCommitment {
                    claim_cid: root.clone(),
                    range: *range,
                    expiration: *expiration,
                };
                // Replace the base-encoded content hash in the URL path
                // with the literal `{blob}` placeholder, so fetchers can
                // substitute the real blob hash at retrieval time (spec
                // §9 "Legacy URL generalization").
                let encoded_hash = content_hash.to_base64();
                let mut addresses: Vec<ProviderAddress> = urls
                    .iter()
                    .map(|url| ProviderAddress::new(url.replace(&encoded_hash, "{blob}")))
                    .collect();
                addresses.push(ProviderAddress::new(self.claims_service_address.template.clone()));
                Some(ProviderResult {
                    context_id,
                    metadata,
                    provider_addresses: addresses,
                })
            }
            Claim::Index {
                root,
                index_cid,
                expiration,
                ..
            } => Some(ProviderResult {
                context_id: ContextId::from_bytes(index_cid.as_bytes().to_vec()),
                metadata: ClaimMetadata::IndexClaim {
                    index_cid: index_cid.clone(),
                    claim_cid: root.clone(),
                    expiration: *expiration,
                },
                provider_addresses: vec![ProviderAddress::new(
                    self.claims_service_address.template.clone(),
                )],
            }),
            Claim::Equals {
                root,
                content_hash,
                equals_cid,
                expiration,
            } => Some(ProviderResult {
                context_id: ContextId::from_bytes(content_hash.as_bytes().to_vec()),
                metadata: ClaimMetadata::EqualsClaim {
                    equals_cid: equals_cid.clone(),
                    claim_cid: root.clone(),
                    expiration: *expiration,
                },
                provider_addresses: vec![ProviderAddress::new(
                    self.claims_service_address.template.clone(),
                )],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::test_support::InMemoryClaimStore;
    use chrono::Utc;

    struct StubMapper(Vec<Hash>);

    #[async_trait]
    impl LegacyClaimMapper for StubMapper {
        async fn legacy_claim_cids(&self, _hash: &Hash) -> Result<Vec<Hash>, IndexingError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn location_claim_synthesizes_blob_placeholder() {
        let content_hash = Hash::digest(b"content");
        let claim = Claim::Location {
            root: Hash::digest(b"root"),
            content_hash: content_hash.clone(),
            urls: vec![format!("https://host/blob/{}", content_hash.to_base64())],
            range: Some((0, 100)),
            space: None,
            expiration: Some(Utc::now()),
            issuer: None,
        };
        let store = Arc::new(InMemoryClaimStore::default());
        store.put(claim.clone()).await.unwrap();
        let mapper = Arc::new(StubMapper(vec![claim.id().clone()]));
        let adapter = LegacyAdapter::new(
            mapper,
            store,
            ProviderAddress::new("https://claims.example/{claim}"),
        );

        let results = adapter.find(&content_hash).await.unwrap();
        assert_eq!(results.len(), 1);
        let addr = &results[0].provider_addresses[0];
        assert!(addr.template.contains("{blob}"));
        assert!(!addr.template.contains(&content_hash.to_base64()));
    }

    #[tokio::test]
    async fn unsupported_claim_is_filtered_not_errored() {
        // Every variant in this model currently synthesizes successfully;
        // this test documents that an empty mapper result yields an empty,
        // non-erroring provider-result list.
        let store = Arc::new(InMemoryClaimStore::default());
        let mapper = Arc::new(StubMapper(vec![]));
        let adapter = LegacyAdapter::new(
            mapper,
            store,
            ProviderAddress::new("https://claims.example/{claim}"),
        );
        let results = adapter.find(&Hash::digest(b"anything")).await.unwrap();
        assert!(results.is_empty());
    }
}
