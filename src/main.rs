//! Indexing service entry point.
//!
//! The UCAN HTTP server and CLI are out of scope for this crate; this
//! binary only wires up the ambient bootstrap — tracing and configuration —
//! and constructs the core components so the library is exercised end to
//! end from a real process, then logs readiness and returns.

use dashmap::DashMap;
use indexing_service::cache::memory::InMemoryBackend;
use indexing_service::cache::{BincodeCodec, KvCache};
use indexing_service::claims::{
    BincodeClaimCodec, CacheWrapper, ClaimFinder, ClaimFinderError, ClaimService, ClaimStore, IdentityCidWrapper,
    SimpleFetcher, StoreWrapper,
};
use indexing_service::config::ServiceConfig;
use indexing_service::hash::Hash;
use indexing_service::model::{Claim, ProviderAddress};
use indexing_service::provider::{HttpIpniClient, LegacyAdapter, LegacyClaimMapper};
use indexing_service::signing::ServiceIdentity;
use indexing_service::telemetry;
use std::sync::Arc;

struct UnimplementedLegacyMapper;

#[async_trait::async_trait]
impl LegacyClaimMapper for UnimplementedLegacyMapper {
    async fn legacy_claim_cids(&self, _hash: &Hash) -> Result<Vec<Hash>, indexing_service::IndexingError> {
        // Legacy bucket-key parsing is a deployment-specific, out-of-scope
        // concern (spec §1); production wiring injects a real mapper here.
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct InProcessClaimStore {
    claims: DashMap<Hash, Claim>,
}

#[async_trait::async_trait]
impl ClaimStore for InProcessClaimStore {
    async fn get(&self, claim_id: &Hash) -> Result<Claim, ClaimFinderError> {
        self.claims.get(claim_id).map(|c| c.clone()).ok_or(ClaimFinderError::NotFound)
    }

    async fn put(&self, claim: Claim) -> Result<(), ClaimFinderError> {
        self.claims.insert(claim.id().clone(), claim);
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let config = ServiceConfig::from_env();
    tracing::info!(?config, "loaded service configuration");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let backend: Arc<dyn indexing_service::cache::KvBackend> = Arc::new(InMemoryBackend::new());

        let claim_store = Arc::new(InProcessClaimStore::default());
        let archive_codec = Arc::new(BincodeClaimCodec);
        let fetch_chain: Arc<dyn ClaimFinder> = Arc::new(CacheWrapper::new(
            StoreWrapper::new(
                IdentityCidWrapper::new(SimpleFetcher::new(archive_codec.clone()), archive_codec),
                claim_store.clone(),
            ),
            KvCache::with_namespace(backend.clone(), Arc::new(BincodeCodec), config.default_expire, "claims:fetch:"),
        ));
        let claim_service = Arc::new(ClaimService::new(
            KvCache::with_namespace(backend.clone(), Arc::new(BincodeCodec), config.default_expire, "claims:service:"),
            claim_store.clone(),
        ));

        let legacy = Arc::new(LegacyAdapter::new(
            Arc::new(UnimplementedLegacyMapper),
            claim_store,
            ProviderAddress::new("https://claims.local/{claim}"),
        ));
        let ipni = Arc::new(HttpIpniClient::new("https://upstream-index.local"));
        let provider_index = Arc::new(indexing_service::provider::ProviderIndex::new(
            backend.clone(),
            config.default_expire,
            ipni,
            legacy,
            config.ipni_timeout,
            config.max_batch_size,
            "did:key:indexing-service-local".into(),
        ));

        let blob_index = Arc::new(indexing_service::index::BlobIndexLookup::new(
            KvCache::with_namespace(backend, Arc::new(BincodeCodec), config.default_expire, "index:blob:"),
            None,
        ));

        let identity = Arc::new(ServiceIdentity::generate());
        let _engine = Arc::new(indexing_service::query::QueryEngine::new(
            provider_index,
            fetch_chain,
            claim_service,
            blob_index,
            identity,
            ProviderAddress::new("https://claims.local/{claim}"),
            config.walker_concurrency,
        ));

        tracing::info!("indexing service components initialized; HTTP/UCAN server is out of scope for this crate");
        Ok::<(), anyhow::Error>(())
    })
}
