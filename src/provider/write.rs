//! Write path: `cache(provider, contextID, digests, metadata)` and
//! `publish(...)` (spec §4.6.2).

use super::ProviderIndex;
use crate::error::IndexingError;
use crate::hash::{ContextId, Hash};
use crate::model::{ClaimMetadata, ProviderAddress, ProviderResult};
use crate::provider::ipni::Advertisement;
use tracing::instrument;

impl ProviderIndex {
    /// Writes a provider result for every multihash in `digests` to the
    /// positive cache, in batches of at most `max_batch_size`, marked
    /// `expirable` as given (spec §4.6.2).
    #[instrument(skip(self, metadata, provider_addresses, digests), fields(count = digests.len()))]
    pub async fn cache_results(
        &self,
        context_id: &ContextId,
        metadata: ClaimMetadata,
        provider_addresses: Vec<ProviderAddress>,
        digests: Vec<Hash>,
        expirable: bool,
    ) -> Result<(), IndexingError> {
        let result = ProviderResult {
            context_id: context_id.clone(),
            metadata,
            provider_addresses,
        };
        for chunk in digests.chunks(self.max_batch_size.max(1)) {
            let mut batch = self.batching.batch();
            for digest in chunk {
                batch.add(digest.clone(), vec![result.clone()]);
                if !expirable {
                    batch.set_expirable(digest.clone(), false);
                }
            }
            batch.commit().await?;
        }
        Ok(())
    }

    /// Pins entries (`expirable=false`) before announcing the advertisement
    /// to the upstream network, so `find` never returns results stale
    /// relative to a completed `publish` in this process (spec §4.6.2,
    /// ordering guarantee §5). `ALREADY_ADVERTISED` from the publisher is
    /// swallowed.
    #[instrument(skip(self, metadata, provider_addresses, digests), fields(count = digests.len()))]
    pub async fn publish(
        &self,
        context_id: &ContextId,
        metadata: ClaimMetadata,
        provider_addresses: Vec<ProviderAddress>,
        digests: Vec<Hash>,
    ) -> Result<(), IndexingError> {
        self.cache_results(context_id, metadata.clone(), provider_addresses, digests.clone(), false)
            .await?;

        let _guard = self.publish_mutex.lock().await;
        let metadata_bytes =
            bincode::serialize(&metadata).map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        let ad = Advertisement {
            previous: None,
            entries: digests,
            context_id: context_id.clone(),
            metadata: metadata_bytes,
            provider: self.provider_id.clone(),
            is_removal: false,
        };
        match self.ipni.publish(ad).await {
            Ok(_head) => Ok(()),
            Err(IndexingError::AlreadyAdvertised) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;
    use crate::cache::KvBackend;
    use crate::claims::test_support::InMemoryClaimStore;
    use crate::provider::legacy::LegacyAdapter;
    use crate::provider::ipni::IpniClient;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopIpni;
    #[async_trait]
    impl IpniClient for NoopIpni {
        async fn find_providers(&self, _hash: &Hash) -> Result<Vec<ProviderResult>, IndexingError> {
            Ok(Vec::new())
        }
        async fn publish(&self, _ad: Advertisement) -> Result<Hash, IndexingError> {
            Ok(Hash::digest(b"new-head"))
        }
        async fn advertisement_head(&self, _provider: &str) -> Result<Option<Hash>, IndexingError> {
            Ok(None)
        }
        async fn fetch_advertisement(&self, _head: &Hash) -> Result<Advertisement, IndexingError> {
            unimplemented!()
        }
    }

    struct EmptyMapper;
    #[async_trait]
    impl super::super::LegacyClaimMapper for EmptyMapper {
        async fn legacy_claim_cids(&self, _hash: &Hash) -> Result<Vec<Hash>, IndexingError> {
            Ok(Vec::new())
        }
    }

    fn index(max_batch_size: usize) -> ProviderIndex {
        let backend: Arc<dyn KvBackend> = Arc::new(InMemoryBackend::new());
        let legacy = Arc::new(LegacyAdapter::new(
            Arc::new(EmptyMapper),
            Arc::new(InMemoryClaimStore::default()),
            ProviderAddress::new("https://claims.example/{claim}"),
        ));
        ProviderIndex::new(
            backend,
            Duration::from_secs(60),
            Arc::new(NoopIpni),
            legacy,
            Duration::from_millis(500),
            max_batch_size,
            "did:key:test-provider".into(),
        )
    }

    #[tokio::test]
    async fn publish_pins_entries_until_notifier_flips_them() {
        let idx = index(10);
        let context_id = ContextId::derive(None, &Hash::digest(b"root"));
        let metadata = ClaimMetadata::EqualsClaim {
            equals_cid: Hash::digest(b"equals"),
            claim_cid: Hash::digest(b"claim"),
            expiration: None,
        };
        let digests: Vec<Hash> = (0..25u32).map(|i| Hash::digest(format!("digest-{i}").as_bytes())).collect();
        idx.publish(
            &context_id,
            metadata,
            vec![ProviderAddress::new("https://claims.example/{claim}")],
            digests.clone(),
        )
        .await
        .unwrap();

        for digest in &digests {
            let members = idx.positive.members(digest).await.unwrap();
            assert_eq!(members.len(), 1);
        }
    }
}
