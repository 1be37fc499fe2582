//! # Blob-index lookup (C5)
//!
//! `find(contextId, providerResult, url) -> ShardedDagIndex` (spec §4.5):
//! check the index cache, fetch and parse on miss, cache the result, and
//! enqueue a best-effort provider-caching follow-up job per shard.

pub mod provider_cache_job;

pub use provider_cache_job::IndexFanoutJob;

use crate::cache::{CacheError, KvCache};
use crate::error::IndexingError;
use crate::hash::ContextId;
use crate::model::{ProviderResult, ShardedDagIndex};
use crate::queue::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct BlobIndexLookup {
    cache: KvCache<ContextId, ShardedDagIndex>,
    http: reqwest::Client,
    fanout_queue: Option<Arc<JobQueue<IndexFanoutJob>>>,
}

impl BlobIndexLookup {
    pub fn new(
        cache: KvCache<ContextId, ShardedDagIndex>,
        fanout_queue: Option<Arc<JobQueue<IndexFanoutJob>>>,
    ) -> Self {
        Self {
            cache,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with a static config"),
            fanout_queue,
        }
    }

    #[instrument(skip(self, provider_result), fields(url = %url))]
    pub async fn find(
        &self,
        context_id: &ContextId,
        provider_result: &ProviderResult,
        url: &str,
    ) -> Result<ShardedDagIndex, IndexingError> {
        match self.cache.get(context_id).await {
            Ok(index) => return Ok(index),
            Err(CacheError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        if !response.status().is_success() {
            return Err(IndexingError::Other(anyhow::anyhow!(
                "index fetch returned status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        let index = ShardedDagIndex::extract(&bytes)?;

        self.cache.put(context_id, &index, true).await?;

        if let Some(queue) = &self.fanout_queue {
            let slices: Vec<_> = index
                .shards()
                .values()
                .flat_map(|slices| slices.keys().cloned())
                .collect();
            let job = IndexFanoutJob {
                context_id: context_id.clone(),
                slices,
                provider_result: provider_result.clone(),
            };
            // Best-effort: queueing failures are logged, never fail the
            // lookup itself (spec §4.5 step 3).
            if let Err(e) = queue.try_queue(job) {
                tracing::warn!(error = %e, "failed to queue index fan-out job");
            }
        }

        Ok(index)
    }

    #[cfg(test)]
    pub(crate) async fn cache_put_for_test(&self, context_id: &ContextId, index: &ShardedDagIndex) {
        self.cache.put(context_id, index, true).await.unwrap();
    }
}

/// Builds the [`crate::queue::JobHandler`] that appends a job's
/// `provider_result` to the provider-result cache entry of every slice hash
/// it names (spec §4.5 step 3's asynchronous pass).
pub fn fanout_handler(
    positive_cache: crate::cache::ValueSetCache<crate::hash::Hash, ProviderResult>,
) -> impl Fn(IndexFanoutJob) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), crate::queue::JobError>> + Send>>
       + Send
       + Sync
       + 'static {
    let positive_cache = Arc::new(positive_cache);
    move |job: IndexFanoutJob| {
        let positive_cache = positive_cache.clone();
        Box::pin(async move {
            for slice in &job.slices {
                positive_cache
                    .add(slice, vec![job.provider_result.clone()], true)
                    .await
                    .map_err(|e| crate::queue::JobError::Failed(e.to_string()))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryBackend;
    use crate::cache::BincodeCodec;
    use crate::hash::Hash;
    use crate::model::{ClaimMetadata, ProviderAddress};
    use std::collections::HashMap;

    fn provider_result() -> ProviderResult {
        ProviderResult {
            context_id: ContextId::derive(None, &Hash::digest(b"root")),
            metadata: ClaimMetadata::IndexClaim {
                index_cid: Hash::digest(b"index"),
                claim_cid: Hash::digest(b"claim"),
                expiration: None,
            },
            provider_addresses: vec![ProviderAddress::new("https://host/{claim}")],
        }
    }

    #[tokio::test]
    async fn cached_index_skips_fetch() {
        let cache = KvCache::new(
            Arc::new(InMemoryBackend::new()),
            Arc::new(BincodeCodec),
            Duration::from_secs(60),
        );
        let context_id = ContextId::derive(None, &Hash::digest(b"root"));
        let mut slices = HashMap::new();
        slices.insert(Hash::digest(b"slice"), (0u64, 10u64));
        let mut shards = HashMap::new();
        shards.insert(Hash::digest(b"shard"), slices);
        let index = ShardedDagIndex::new(shards);
        cache.put(&context_id, &index, true).await.unwrap();

        let lookup = BlobIndexLookup::new(cache, None);
        let result = lookup
            .find(&context_id, &provider_result(), "http://unreachable.invalid/index")
            .await
            .unwrap();
        assert_eq!(result.shards().len(), 1);
    }
}
