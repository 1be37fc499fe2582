//! Remote-sync notifier (spec §4.6.3): periodically polls the upstream
//! index for this provider's own advertisement head, and flips cache
//! entries from pinned to expirable once an advertisement is observed
//! remotely.
//!
//! Runs as a `tokio::time::interval`-driven background task so the poll
//! cadence is independent of request traffic.

use super::ipni::IpniClient;
use crate::cache::{BatchingValueSetCache, KvBackend};
use crate::error::IndexingError;
use crate::hash::Hash;
use crate::model::ProviderResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Persisted last-observed head. Persistence itself is an external concern
/// (spec §9 "Cache abstraction over a networked KV"); this trait is the
/// seam a durable store plugs into.
#[async_trait]
pub trait HeadStore: Send + Sync {
    async fn get(&self, provider: &str) -> Result<Option<Hash>, IndexingError>;
    async fn set(&self, provider: &str, head: Hash) -> Result<(), IndexingError>;
}

#[derive(Default)]
pub struct InMemoryHeadStore {
    heads: dashmap::DashMap<String, Hash>,
}

#[async_trait]
impl HeadStore for InMemoryHeadStore {
    async fn get(&self, provider: &str) -> Result<Option<Hash>, IndexingError> {
        Ok(self.heads.get(provider).map(|h| h.clone()))
    }

    async fn set(&self, provider: &str, head: Hash) -> Result<(), IndexingError> {
        self.heads.insert(provider.to_string(), head);
        Ok(())
    }
}

pub struct Notifier {
    ipni: Arc<dyn IpniClient>,
    head_store: Arc<dyn HeadStore>,
    batching: Arc<BatchingValueSetCache<Hash, ProviderResult>>,
    provider_id: String,
    poll_interval: Duration,
}

impl Notifier {
    pub fn new(
        ipni: Arc<dyn IpniClient>,
        head_store: Arc<dyn HeadStore>,
        batching: Arc<BatchingValueSetCache<Hash, ProviderResult>>,
        provider_id: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ipni,
            head_store,
            batching,
            provider_id,
            poll_interval,
        }
    }

    /// Runs the poll loop until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        tracing::warn!(error = %e, "remote-sync notifier poll failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// One poll cycle: compares the observed remote head against the last
    /// persisted head, and — if it advanced — walks the advertisement chain
    /// and flips every entry to expirable (spec §4.6.3).
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<(), IndexingError> {
        let observed_head = self.ipni.advertisement_head(&self.provider_id).await?;
        let Some(head) = observed_head else {
            return Ok(());
        };
        let last_seen = self.head_store.get(&self.provider_id).await?;
        if last_seen.as_ref() == Some(&head) {
            return Ok(());
        }

        let entries = self.walk_chain_since(&head, last_seen.as_ref()).await?;

        let mut batch = self.batching.batch();
        for entry in &entries {
            batch.set_expirable(entry.clone(), true);
        }
        batch.commit().await?;

        // Only persist the new head once every entry in the chain segment
        // has been flipped; a failure above must not advance the persisted
        // head (spec §4.6.3: "failures ... abort the walk without partial
        // persistence of the new head").
        self.head_store.set(&self.provider_id, head).await
    }

    /// Walks the advertisement chain backwards from `head` until reaching
    /// `prev` (exclusive) or the chain root, collecting every entry hash
    /// along the way.
    async fn walk_chain_since(
        &self,
        head: &Hash,
        prev: Option<&Hash>,
    ) -> Result<Vec<Hash>, IndexingError> {
        let mut entries = Vec::new();
        let mut cursor = Some(head.clone());
        while let Some(current) = cursor {
            if Some(&current) == prev {
                break;
            }
            let ad = self.ipni.fetch_advertisement(&current).await?;
            entries.extend(ad.entries.iter().cloned());
            cursor = ad.previous;
        }
        Ok(entries)
    }
}
