//! Read path: `find(hash, spaces, targetClaims) -> [ProviderResult]`
//! (spec §4.6.1).

use super::ProviderIndex;
use crate::cache::CacheError;
use crate::error::IndexingError;
use crate::hash::{ContextId, Hash};
use crate::model::{ClaimCodec, ProviderResult};
use std::collections::HashSet;
use tracing::instrument;

impl ProviderIndex {
    #[instrument(skip(self, target_claims), fields(hash = %hash))]
    pub async fn find(
        &self,
        hash: &Hash,
        spaces: &[Vec<u8>],
        target_claims: &HashSet<ClaimCodec>,
    ) -> Result<Vec<ProviderResult>, IndexingError> {
        // Step 1: positive cache lookup.
        match self.positive.members(hash).await {
            Ok(results) => {
                let matching = filter_by_codec(results, target_claims);
                if !matching.is_empty() {
                    return Ok(filter_by_space(matching, spaces));
                }
            }
            Err(CacheError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        // Step 2: negative cache check + parallel source race.
        let negative_covers = self.negative_cache_covers(hash, target_claims).await?;
        let (results, newly_negative) = self.race_sources(hash, negative_covers).await?;

        // Step 3: cache population.
        if !results.is_empty() {
            self.positive.add(hash, results.clone(), true).await?;
            self.positive.set_expirable(hash, true).await?;
        }
        if newly_negative && !negative_covers {
            self.negative
                .add(hash, target_claims.iter().copied().collect(), true)
                .await?;
        }

        // Step 4: space filter.
        let filtered = filter_by_codec(results, target_claims);
        Ok(filter_by_space(filtered, spaces))
    }

    /// True if the negative cache already records every codec in
    /// `target_claims` as known-absent for `hash` (spec §4.6.1 step 2).
    pub(crate) async fn negative_cache_covers(
        &self,
        hash: &Hash,
        target_claims: &HashSet<ClaimCodec>,
    ) -> Result<bool, IndexingError> {
        match self.negative.members(hash).await {
            Ok(known_absent) => {
                let known_absent: HashSet<_> = known_absent.into_iter().collect();
                Ok(target_claims.iter().all(|c| known_absent.contains(c)))
            }
            Err(CacheError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Races the upstream index and legacy adapter, skipping upstream when
    /// `skip_upstream` is set. Returns the winning non-empty result set (or
    /// the best available on both-empty) plus whether upstream returned an
    /// empty, error-free result (the trigger for populating the negative
    /// cache).
    async fn race_sources(
        &self,
        hash: &Hash,
        skip_upstream: bool,
    ) -> Result<(Vec<ProviderResult>, bool), IndexingError> {
        let hash_for_legacy = hash.clone();
        let legacy = self.legacy.clone();
        let mut legacy_task = tokio::spawn(async move { legacy.find(&hash_for_legacy).await });

        if skip_upstream {
            let legacy_result = (&mut legacy_task).await.map_err(|e| {
                IndexingError::Other(anyhow::anyhow!("legacy adapter task panicked: {e}"))
            })?;
            return match legacy_result {
                Ok(results) => Ok((results, false)),
                Err(e) => Err(IndexingError::SourcesFailed {
                    upstream: "skipped (negative cache covers target claims)".into(),
                    legacy: e.to_string(),
                }),
            };
        }

        let hash_for_upstream = hash.clone();
        let ipni = self.ipni.clone();
        let timeout = self.ipni_timeout;
        let mut upstream_task = tokio::spawn(async move {
            match tokio::time::timeout(timeout, ipni.find_providers(&hash_for_upstream)).await {
                Ok(result) => result,
                Err(_) => Err(IndexingError::IpniTimeout),
            }
        });

        let (first_is_upstream, first_result): (bool, Result<Vec<ProviderResult>, String>) = tokio::select! {
            upstream = &mut upstream_task => {
                let result = upstream.map_err(|e| IndexingError::Other(anyhow::anyhow!("upstream task panicked: {e}")))?;
                if let Ok(results) = &result {
                    if !results.is_empty() {
                        legacy_task.abort();
                        return Ok((results.clone(), false));
                    }
                }
                (true, result.map_err(|e| e.to_string()))
            }
            legacy = &mut legacy_task => {
                let result = legacy.map_err(|e| IndexingError::Other(anyhow::anyhow!("legacy adapter task panicked: {e}")))?;
                if let Ok(results) = &result {
                    if !results.is_empty() {
                        upstream_task.abort();
                        return Ok((results.clone(), false));
                    }
                }
                (false, result.map_err(|e| e.to_string()))
            }
        };

        // Whichever source finished first was empty or errored; wait for
        // the other one to decide the outcome.
        let second_result: Result<Vec<ProviderResult>, String> = if first_is_upstream {
            legacy_task
                .await
                .map_err(|e| IndexingError::Other(anyhow::anyhow!("legacy adapter task panicked: {e}")))?
                .map_err(|e| e.to_string())
        } else {
            upstream_task
                .await
                .map_err(|e| IndexingError::Other(anyhow::anyhow!("upstream task panicked: {e}")))?
                .map_err(|e| e.to_string())
        };

        let (upstream_result, legacy_result) = if first_is_upstream {
            (first_result, second_result)
        } else {
            (second_result, first_result)
        };

        match (upstream_result, legacy_result) {
            // Upstream succeeded empty: per spec §4.6.1, legacy's result
            // (even if also empty) is what gets returned, and the empty
            // upstream response is what triggers negative-cache population.
            (Ok(_), Ok(legacy_results)) => Ok((legacy_results, true)),
            (Ok(_), Err(legacy_err)) => Err(IndexingError::SourcesFailed {
                upstream: "empty".into(),
                legacy: legacy_err,
            }),
            (Err(upstream_err), Ok(legacy_results)) if !legacy_results.is_empty() => {
                Ok((legacy_results, false))
            }
            (Err(upstream_err), Ok(_)) => Err(IndexingError::SourcesFailed {
                upstream: upstream_err,
                legacy: "empty".into(),
            }),
            (Err(upstream_err), Err(legacy_err)) => Err(IndexingError::SourcesFailed {
                upstream: upstream_err,
                legacy: legacy_err,
            }),
        }
    }
}

fn filter_by_codec(results: Vec<ProviderResult>, target_claims: &HashSet<ClaimCodec>) -> Vec<ProviderResult> {
    results
        .into_iter()
        .filter(|r| target_claims.contains(&r.metadata.codec()))
        .collect()
}

/// Keep only results whose context id matches one of the requester's
/// subject spaces, for metadata shapes that are context-id-filterable
/// (currently only location commitments); non-filterable results always
/// pass through (spec §4.6.1 step 4).
fn filter_by_space(results: Vec<ProviderResult>, spaces: &[Vec<u8>]) -> Vec<ProviderResult> {
    if spaces.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|r| {
            if !r.metadata.filterable_by_context() {
                return true;
            }
            spaces.iter().any(|space| {
                let expected = ContextId::derive(Some(space), r.metadata.claim_cid());
                expected == r.context_id
            })
        })
        .collect()
}
