//! Black-box coverage of the C4 claim finder chain and the C7 query engine,
//! exercised only through their public API: the cached-exact-hit, index
//! fan-out, and claim-CID-mismatch scenarios.

mod common;

use async_trait::async_trait;
use indexing_service::cache::{BincodeCodec, KvCache};
use indexing_service::claims::{
    BincodeClaimCodec, CacheWrapper, ClaimFinder, ClaimFinderError, ClaimService, ClaimStore, IdentityCidWrapper,
    SimpleFetcher, StoreWrapper,
};
use indexing_service::cache::memory::InMemoryBackend;
use indexing_service::hash::{ContextId, Hash};
use indexing_service::index::BlobIndexLookup;
use indexing_service::model::{
    Claim, ClaimMetadata, ProviderAddress, ProviderResult, Query, QueryType, ShardedDagIndex,
};
use indexing_service::provider::{LegacyAdapter, LegacyClaimMapper, ProviderIndex};
use indexing_service::query::QueryEngine;
use indexing_service::signing::ServiceIdentity;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct InProcessClaimStore {
    claims: dashmap::DashMap<Hash, Claim>,
}

#[async_trait]
impl ClaimStore for InProcessClaimStore {
    async fn get(&self, claim_id: &Hash) -> Result<Claim, ClaimFinderError> {
        self.claims.get(claim_id).map(|c| c.clone()).ok_or(ClaimFinderError::NotFound)
    }
    async fn put(&self, claim: Claim) -> Result<(), ClaimFinderError> {
        self.claims.insert(claim.id().clone(), claim);
        Ok(())
    }
}

struct EmptyMapper;
#[async_trait]
impl LegacyClaimMapper for EmptyMapper {
    async fn legacy_claim_cids(&self, _hash: &Hash) -> Result<Vec<Hash>, indexing_service::IndexingError> {
        Ok(Vec::new())
    }
}

struct EmptyIpni;
#[async_trait]
impl indexing_service::provider::ipni::IpniClient for EmptyIpni {
    async fn find_providers(&self, _hash: &Hash) -> Result<Vec<ProviderResult>, indexing_service::IndexingError> {
        Ok(Vec::new())
    }
    async fn publish(&self, _ad: indexing_service::provider::ipni::Advertisement) -> Result<Hash, indexing_service::IndexingError> {
        unimplemented!()
    }
    async fn advertisement_head(&self, _provider: &str) -> Result<Option<Hash>, indexing_service::IndexingError> {
        unimplemented!()
    }
    async fn fetch_advertisement(&self, _head: &Hash) -> Result<indexing_service::provider::ipni::Advertisement, indexing_service::IndexingError> {
        unimplemented!()
    }
}

struct Harness {
    engine: Arc<QueryEngine>,
    provider_index: Arc<ProviderIndex>,
    claim_store: Arc<InProcessClaimStore>,
}

fn build_harness() -> Harness {
    let backend: Arc<dyn indexing_service::cache::KvBackend> = Arc::new(InMemoryBackend::new());
    let claim_store = Arc::new(InProcessClaimStore::default());
    let archive_codec = Arc::new(BincodeClaimCodec);
    let fetch_chain: Arc<dyn ClaimFinder> = Arc::new(CacheWrapper::new(
        StoreWrapper::new(
            IdentityCidWrapper::new(SimpleFetcher::new(archive_codec.clone()), archive_codec),
            claim_store.clone(),
        ),
        KvCache::with_namespace(backend.clone(), Arc::new(BincodeCodec), Duration::from_secs(60), "claims:fetch:"),
    ));
    let claim_service = Arc::new(ClaimService::new(
        KvCache::with_namespace(backend.clone(), Arc::new(BincodeCodec), Duration::from_secs(60), "claims:service:"),
        claim_store.clone(),
    ));

    let legacy = Arc::new(LegacyAdapter::new(
        Arc::new(EmptyMapper),
        claim_store.clone(),
        ProviderAddress::new("https://claims.local/{claim}"),
    ));
    let provider_index = Arc::new(ProviderIndex::new(
        backend.clone(),
        Duration::from_secs(60),
        Arc::new(EmptyIpni),
        legacy,
        Duration::from_millis(500),
        1000,
        "did:key:test-provider".into(),
    ));

    let blob_index = Arc::new(BlobIndexLookup::new(
        KvCache::with_namespace(backend, Arc::new(BincodeCodec), Duration::from_secs(60), "index:blob:"),
        None,
    ));

    let identity = Arc::new(ServiceIdentity::generate());
    let engine = Arc::new(QueryEngine::new(
        provider_index.clone(),
        fetch_chain,
        claim_service,
        blob_index,
        identity,
        ProviderAddress::new("https://claims.local/{claim}"),
        4,
    ));

    Harness { engine, provider_index, claim_store }
}

fn location_result(claim_cid: &Hash, context_hash: &Hash, addresses: Vec<ProviderAddress>) -> ProviderResult {
    ProviderResult {
        context_id: ContextId::derive(None, context_hash),
        metadata: ClaimMetadata::LocationCommitment { claim_cid: claim_cid.clone(), range: None, expiration: None },
        provider_addresses: addresses,
    }
}

/// Seed scenario 1 (spec §8): a location commitment already in the
/// provider-result cache and its claim already in the permanent store is
/// served with no network fetch at all — an unreachable fetch URL proves
/// it, since the chain would otherwise fail trying to reach it.
#[tokio::test]
async fn cached_exact_hit_returns_one_claim_with_no_network_fetch() {
    let harness = build_harness();
    let content_hash = Hash::digest(b"content");
    let claim_cid = Hash::digest(b"location-claim");
    let claim = Claim::Location {
        root: claim_cid.clone(),
        content_hash: content_hash.clone(),
        urls: vec!["https://host/blob".into()],
        range: None,
        space: None,
        expiration: None,
        issuer: None,
    };
    harness.claim_store.put(claim).await.unwrap();

    let context_id = ContextId::derive(None, &content_hash);
    let metadata = ClaimMetadata::LocationCommitment { claim_cid: claim_cid.clone(), range: None, expiration: None };
    harness
        .provider_index
        .cache_results(
            &context_id,
            metadata,
            vec![ProviderAddress::new("http://127.0.0.1:1/unreachable/{claim}")],
            vec![content_hash.clone()],
            true,
        )
        .await
        .unwrap();

    let result = harness.engine.query(Query::new(QueryType::Location, vec![content_hash])).await.unwrap();
    assert_eq!(result.claims.len(), 1);
    assert_eq!(result.claims[0].id(), &claim_cid);
    assert!(result.indexes.is_empty());
}

/// Seed scenario 4 (spec §8): an index claim fans out through a real blob
/// fetch into its shard's location, proving the wiring across C4/C5/C6/C7
/// without any crate-internal cache-seeding hook.
#[tokio::test]
async fn index_fan_out_discovers_shard_location_through_real_blob_fetch() {
    let harness = build_harness();

    let content_hash = Hash::digest(b"content");
    let index_cid = Hash::digest(b"index-blob");
    let index_claim_cid = Hash::digest(b"index-claim");
    let index_location_claim_cid = Hash::digest(b"index-location-claim");
    let shard_hash = Hash::digest(b"shard-a");
    let shard_location_claim_cid = Hash::digest(b"shard-location-claim");

    harness.claim_store.put(Claim::Index {
        root: index_claim_cid.clone(),
        content_cid: content_hash.clone(),
        index_cid: index_cid.clone(),
        expiration: None,
    }).await.unwrap();
    harness.claim_store.put(Claim::Location {
        root: index_location_claim_cid.clone(),
        content_hash: index_cid.clone(),
        urls: vec!["https://host/index-blob".into()],
        range: None,
        space: None,
        expiration: None,
        issuer: None,
    }).await.unwrap();
    harness.claim_store.put(Claim::Location {
        root: shard_location_claim_cid.clone(),
        content_hash: shard_hash.clone(),
        urls: vec!["https://host/shard".into()],
        range: None,
        space: None,
        expiration: None,
        issuer: None,
    }).await.unwrap();

    let mut slices = HashMap::new();
    slices.insert(content_hash.clone(), (0u64, 10u64));
    let mut shards = HashMap::new();
    shards.insert(shard_hash.clone(), slices);
    let index_bytes = ShardedDagIndex::new(shards).archive().unwrap();
    let blob_url = common::serve_once(index_bytes).await;

    let index_result = ProviderResult {
        context_id: ContextId::derive(None, &content_hash),
        metadata: ClaimMetadata::IndexClaim { index_cid: index_cid.clone(), claim_cid: index_claim_cid.clone(), expiration: None },
        provider_addresses: vec![ProviderAddress::new("unused/{claim}")],
    };
    // The one-shot server answers any request with the index archive
    // regardless of path, so the address needs no `{blob}` placeholder.
    let index_location_result = location_result(&index_location_claim_cid, &index_cid, vec![ProviderAddress::new(blob_url)]);
    let shard_location_result = location_result(&shard_location_claim_cid, &shard_hash, vec![ProviderAddress::new("unused/{claim}")]);

    harness.provider_index.cache_results(
        &ContextId::derive(None, &content_hash),
        index_result.metadata.clone(),
        index_result.provider_addresses.clone(),
        vec![content_hash.clone()],
        true,
    ).await.unwrap();
    harness.provider_index.cache_results(
        &index_location_result.context_id,
        index_location_result.metadata.clone(),
        index_location_result.provider_addresses.clone(),
        vec![index_cid.clone()],
        true,
    ).await.unwrap();
    harness.provider_index.cache_results(
        &shard_location_result.context_id,
        shard_location_result.metadata.clone(),
        shard_location_result.provider_addresses.clone(),
        vec![shard_hash.clone()],
        true,
    ).await.unwrap();

    let result = harness.engine.query(Query::new(QueryType::Standard, vec![content_hash])).await.unwrap();
    assert_eq!(result.claims.len(), 3);
    assert_eq!(result.indexes.len(), 1);
}

/// Boundary behavior (spec §8): a fetched archive decoding to a claim whose
/// id does not match the requested id surfaces `IdMismatch` naming both.
#[tokio::test]
async fn mismatched_claim_id_is_rejected_with_both_ids_named() {
    let codec = Arc::new(BincodeClaimCodec);
    let actual_claim = Claim::Equals {
        root: Hash::digest(b"actual-id"),
        content_hash: Hash::digest(b"content"),
        equals_cid: Hash::digest(b"equals"),
        expiration: None,
    };
    let bytes = {
        use indexing_service::claims::ClaimArchiveCodec;
        codec.encode_claim(&actual_claim).unwrap()
    };
    let url = common::serve_once(bytes).await;

    let fetcher = SimpleFetcher::new(codec);
    let requested_id = Hash::digest(b"requested-id-that-does-not-match");
    let err = fetcher.find(&requested_id, &url).await.unwrap_err();
    match err {
        ClaimFinderError::IdMismatch { requested, found } => {
            assert_eq!(requested, requested_id.to_string());
            assert_eq!(found, actual_claim.id().to_string());
        }
        other => panic!("expected IdMismatch, got {other:?}"),
    }
}
