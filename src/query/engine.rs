//! Entry point `query(q) -> QueryResult` (spec §4.7): builds one walk job
//! per requested hash and drives the C3 walker across C4 (claim fetch), C5
//! (index fetch), and C6 (provider lookup). Also hosts `publish`/`cache`,
//! which orchestrate C4's and C6's own write paths for the three claim
//! kinds.
//!
//! The job/state shape is a plain job struct plus a `WalkState`-guarded
//! accumulator, letting a handler spawn further jobs mid-walk as the
//! discovery graph grows (an index claim discovers shard location jobs, a
//! location claim with a pending index discovers the index blob, etc.).

use crate::claims::{ClaimFinder, ClaimService};
use crate::error::IndexingError;
use crate::hash::{ContextId, Hash};
use crate::index::BlobIndexLookup;
use crate::model::{Claim, ClaimCodec, ClaimMetadata, ProviderAddress, ProviderResult, Query, QueryResult, QueryType};
use crate::provider::ProviderIndex;
use crate::signing::ServiceIdentity;
use crate::walker::{walk, Spawner, WalkState};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::instrument;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), IndexingError>> + Send>>;

/// `(hash, maybeIndexForHash, maybeIndexProviderResult, queryType)` (spec
/// §4.7).
#[derive(Clone)]
struct EngineJob {
    hash: Hash,
    index_for_hash: Option<Hash>,
    query_type: QueryType,
}

#[derive(Clone, Default)]
struct EngineState {
    visited: HashSet<(Hash, QueryType)>,
    result: QueryResult,
}

pub struct QueryEngine {
    provider_index: Arc<ProviderIndex>,
    claim_finder: Arc<dyn ClaimFinder>,
    claim_service: Arc<ClaimService>,
    blob_index: Arc<BlobIndexLookup>,
    identity: Arc<ServiceIdentity>,
    provider_address: ProviderAddress,
    concurrency: usize,
}

impl QueryEngine {
    pub fn new(
        provider_index: Arc<ProviderIndex>,
        claim_finder: Arc<dyn ClaimFinder>,
        claim_service: Arc<ClaimService>,
        blob_index: Arc<BlobIndexLookup>,
        identity: Arc<ServiceIdentity>,
        provider_address: ProviderAddress,
        concurrency: usize,
    ) -> Self {
        Self {
            provider_index,
            claim_finder,
            claim_service,
            blob_index,
            identity,
            provider_address,
            concurrency,
        }
    }

    #[instrument(skip(self, query), fields(hashes = query.hashes.len()))]
    pub async fn query(&self, query: Query) -> Result<QueryResult, IndexingError> {
        let initial_jobs: Vec<EngineJob> = query
            .hashes
            .iter()
            .map(|hash| EngineJob {
                hash: hash.clone(),
                index_for_hash: None,
                query_type: query.query_type,
            })
            .collect();

        let spaces = Arc::new(query.subject_spaces.clone());
        let provider_index = self.provider_index.clone();
        let claim_finder = self.claim_finder.clone();
        let blob_index = self.blob_index.clone();

        let handler = Arc::new(move |job: EngineJob, spawner: Spawner<EngineJob>, state: WalkState<EngineState>| {
            let spaces = spaces.clone();
            let provider_index = provider_index.clone();
            let claim_finder = claim_finder.clone();
            let blob_index = blob_index.clone();
            Box::pin(handle_job(job, spawner, state, spaces, provider_index, claim_finder, blob_index)) as HandlerFuture
        });

        let final_state = walk(initial_jobs, EngineState::default(), self.concurrency.max(1), handler).await?;
        let result = final_state.result;

        if matches!(query.query_type, QueryType::StandardCompressed) {
            Ok(self.compress(&query, result))
        } else {
            Ok(result)
        }
    }

    /// `standard_compressed`: replace any index + underlying location found
    /// for a queried hash with one synthesized, service-signed location
    /// commitment (spec §4.7 point 5).
    fn compress(&self, query: &Query, result: QueryResult) -> QueryResult {
        let mut synthesized = Vec::new();
        for hash in &query.hashes {
            if let Some(claim) = self.synthesize_compressed_claim(hash, &result) {
                synthesized.push(claim);
            }
        }
        if synthesized.is_empty() {
            return result;
        }
        let mut compressed = QueryResult::empty();
        compressed.messages = result.messages;
        for claim in synthesized {
            compressed.add_claim(claim);
        }
        compressed
    }

    fn synthesize_compressed_claim(&self, hash: &Hash, result: &QueryResult) -> Option<Claim> {
        for index in result.indexes.values() {
            let Some((shard_hash, (slice_offset, slice_length))) = index.shard_containing(hash) else {
                continue;
            };
            let shard_location = result.claims.iter().find_map(|claim| match claim {
                Claim::Location { content_hash, range, urls, .. } if content_hash == shard_hash => {
                    Some((range.unwrap_or((0, 0)), urls.clone()))
                }
                _ => None,
            })?;
            let (original_range, urls) = shard_location;
            let combined_range = (original_range.0 + slice_offset, slice_length);
            return Some(self.identity.sign_location_claim(
                Hash::digest(format!("compressed:{}", hash.to_hex()).as_bytes()),
                hash.clone(),
                urls,
                Some(combined_range),
            ));
        }
        None
    }

    /// Orchestrates C4.publish plus C6.publish for the three claim kinds
    /// (spec §4.7 "Publish").
    #[instrument(skip(self, claim), fields(claim_id = %claim.id()))]
    pub async fn publish(&self, claim: Claim) -> Result<(), IndexingError> {
        self.claim_service.publish(claim.clone()).await?;

        match &claim {
            Claim::Location { content_hash, space, range, .. } => {
                let context_id = ContextId::derive(space.as_deref(), content_hash);
                let metadata = ClaimMetadata::LocationCommitment {
                    claim_cid: claim.id().clone(),
                    range: *range,
                    expiration: claim.expiration(),
                };
                self.provider_index
                    .publish(&context_id, metadata, vec![self.provider_address.clone()], vec![content_hash.clone()])
                    .await
            }
            Claim::Index { content_cid, index_cid, .. } => {
                let target: HashSet<ClaimCodec> = [ClaimCodec::Location].into_iter().collect();
                let location_results = self.provider_index.find(index_cid, &[], &target).await?;
                let location_result = location_results.into_iter().next().ok_or_else(|| {
                    IndexingError::Other(anyhow::anyhow!("no location found for index blob {}", index_cid))
                })?;
                let blob_claim_cid = match &location_result.metadata {
                    ClaimMetadata::LocationCommitment { claim_cid, .. } => claim_cid.clone(),
                    _ => {
                        return Err(IndexingError::Other(anyhow::anyhow!(
                            "unexpected metadata kind for index blob location"
                        )))
                    }
                };
                let claim_url = location_result
                    .primary_address()
                    .map(|a| a.resolve_claim(&blob_claim_cid))
                    .unwrap_or_default();
                let location_claim = self.claim_finder.find(&blob_claim_cid, &claim_url).await?;
                self.identity
                    .validate_self_issued(&location_claim)
                    .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;

                let blob_url = location_result
                    .primary_address()
                    .map(|a| a.resolve_blob(index_cid))
                    .unwrap_or_default();
                let index = self.blob_index.find(&location_result.context_id, &location_result, &blob_url).await?;
                let mut slices: Vec<Hash> = index.shards().values().flat_map(|s| s.keys().cloned()).collect();
                slices.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
                slices.dedup();

                let context_id = ContextId::derive(None, content_cid);
                let metadata = ClaimMetadata::IndexClaim {
                    index_cid: index_cid.clone(),
                    claim_cid: claim.id().clone(),
                    expiration: claim.expiration(),
                };
                self.provider_index
                    .publish(&context_id, metadata, vec![self.provider_address.clone()], slices)
                    .await
            }
            Claim::Equals { content_hash, equals_cid, .. } => {
                let context_id = ContextId::derive(None, content_hash);
                let metadata = ClaimMetadata::EqualsClaim {
                    equals_cid: equals_cid.clone(),
                    claim_cid: claim.id().clone(),
                    expiration: claim.expiration(),
                };
                self.provider_index
                    .publish(
                        &context_id,
                        metadata,
                        vec![self.provider_address.clone()],
                        vec![content_hash.clone(), equals_cid.clone()],
                    )
                    .await
            }
        }
    }

    /// Accepts only location commitments (spec §4.7 "Cache").
    #[instrument(skip(self, claim), fields(claim_id = %claim.id()))]
    pub async fn cache(&self, claim: Claim) -> Result<(), IndexingError> {
        match &claim {
            Claim::Location { content_hash, space, range, .. } => {
                self.claim_service.cache(&claim).await?;
                let context_id = ContextId::derive(space.as_deref(), content_hash);
                let metadata = ClaimMetadata::LocationCommitment {
                    claim_cid: claim.id().clone(),
                    range: *range,
                    expiration: claim.expiration(),
                };
                self.provider_index
                    .cache_results(
                        &context_id,
                        metadata,
                        vec![self.provider_address.clone()],
                        vec![content_hash.clone()],
                        true,
                    )
                    .await
            }
            _ => Err(IndexingError::UnrecognizedClaim),
        }
    }
}

async fn handle_job(
    job: EngineJob,
    spawner: Spawner<EngineJob>,
    state: WalkState<EngineState>,
    spaces: Arc<Vec<Vec<u8>>>,
    provider_index: Arc<ProviderIndex>,
    claim_finder: Arc<dyn ClaimFinder>,
    blob_index: Arc<BlobIndexLookup>,
) -> Result<(), IndexingError> {
    let dedup_key = (job.hash.clone(), job.query_type);
    let first_visit = state
        .compare_and_swap(
            |s| !s.visited.contains(&dedup_key),
            |s| {
                s.visited.insert(dedup_key.clone());
            },
        )
        .await;
    if !first_visit {
        return Ok(());
    }

    let target_claims = job.query_type.target_claims();
    let results = match provider_index.find(&job.hash, &spaces, &target_claims).await {
        Ok(results) => results,
        Err(IndexingError::KeyNotFound) => Vec::new(),
        Err(e) => return Err(e),
    };

    for provider_result in results {
        match provider_result.metadata.clone() {
            ClaimMetadata::LocationCommitment { claim_cid, .. } => {
                let url = provider_result.primary_address().map(|a| a.resolve_claim(&claim_cid)).unwrap_or_default();
                let claim = match claim_finder.find(&claim_cid, &url).await {
                    Ok(claim) => claim,
                    Err(e) => {
                        tracing::warn!(error = %e, claim_id = %claim_cid, "location claim fetch failed, continuing");
                        continue;
                    }
                };
                state.modify(|s| s.result.add_claim(claim)).await;

                if let Some(index_for_hash) = job.index_for_hash.clone() {
                    let blob_url = provider_result.primary_address().map(|a| a.resolve_blob(&job.hash)).unwrap_or_default();
                    let index = match blob_index.find(&provider_result.context_id, &provider_result, &blob_url).await {
                        Ok(index) => index,
                        Err(e) => {
                            tracing::warn!(error = %e, "index blob fetch failed, continuing");
                            continue;
                        }
                    };
                    let context_id = provider_result.context_id.clone();
                    let shards: Vec<Hash> = index.shards_containing(&index_for_hash).cloned().collect();
                    state.modify(|s| s.result.add_index(context_id, index)).await;
                    for shard in shards {
                        spawner.spawn(EngineJob {
                            hash: shard,
                            index_for_hash: None,
                            query_type: QueryType::IndexOrLocation,
                        });
                    }
                }
            }
            ClaimMetadata::IndexClaim { claim_cid, index_cid, .. } => {
                let url = provider_result.primary_address().map(|a| a.resolve_claim(&claim_cid)).unwrap_or_default();
                let claim = match claim_finder.find(&claim_cid, &url).await {
                    Ok(claim) => claim,
                    Err(e) => {
                        tracing::warn!(error = %e, claim_id = %claim_cid, "index claim fetch failed, continuing");
                        continue;
                    }
                };
                state.modify(|s| s.result.add_claim(claim)).await;
                spawner.spawn(EngineJob {
                    hash: index_cid,
                    index_for_hash: Some(job.hash.clone()),
                    query_type: QueryType::IndexOrLocation,
                });
            }
            ClaimMetadata::EqualsClaim { claim_cid, equals_cid, .. } => {
                let url = provider_result.primary_address().map(|a| a.resolve_claim(&claim_cid)).unwrap_or_default();
                let claim = match claim_finder.find(&claim_cid, &url).await {
                    Ok(claim) => claim,
                    Err(e) => {
                        tracing::warn!(error = %e, claim_id = %claim_cid, "equals claim fetch failed, continuing");
                        continue;
                    }
                };
                state.modify(|s| s.result.add_claim(claim)).await;
                let next_hash = if equals_cid != job.hash {
                    equals_cid
                } else {
                    provider_result.context_id.as_hash()
                };
                spawner.spawn(EngineJob {
                    hash: next_hash,
                    index_for_hash: None,
                    query_type: QueryType::Location,
                });
            }
        }
    }
    Ok(())
}
