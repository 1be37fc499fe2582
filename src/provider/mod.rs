//! # Provider index (C6) — the largest subcomponent.
//!
//! Materializes the authoritative list of provider results for a hash by
//! combining three sources with the precedence spec §4.6 describes
//! (positive cache → {upstream index, legacy adapter} raced → negative
//! cache), and owns the cache-then-publish write path (spec §4.6.2).
//!
//! The source race uses a two-branch `tokio::select!` so a slow legacy
//! adapter never holds up a fast upstream response (or vice versa); a
//! single process-wide publish mutex serializes advertisement writes so two
//! concurrent publishes cannot interleave their chain-head updates.

pub mod find;
pub mod ipni;
pub mod legacy;
pub mod notifier;
pub mod write;

pub use ipni::{Advertisement, HttpIpniClient, IpniClient};
pub use legacy::{LegacyAdapter, LegacyClaimMapper};
pub use notifier::{HeadStore, Notifier};

use crate::cache::{BatchingValueSetCache, BincodeCodec, KvBackend, ValueSetCache};
use crate::model::{ClaimCodec, ProviderResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// Combines the three read sources and owns the write path.
pub struct ProviderIndex {
    pub(crate) positive: ValueSetCache<crate::hash::Hash, ProviderResult>,
    pub(crate) negative: ValueSetCache<crate::hash::Hash, ClaimCodec>,
    pub(crate) batching: BatchingValueSetCache<crate::hash::Hash, ProviderResult>,
    pub(crate) ipni: Arc<dyn IpniClient>,
    pub(crate) legacy: Arc<LegacyAdapter>,
    pub(crate) ipni_timeout: Duration,
    pub(crate) max_batch_size: usize,
    pub(crate) provider_id: String,
    pub(crate) publish_mutex: AsyncMutex<()>,
}

impl ProviderIndex {
    pub fn new(
        backend: Arc<dyn KvBackend>,
        default_expire: Duration,
        ipni: Arc<dyn IpniClient>,
        legacy: Arc<LegacyAdapter>,
        ipni_timeout: Duration,
        max_batch_size: usize,
        provider_id: String,
    ) -> Self {
        Self {
            positive: ValueSetCache::with_namespace(backend.clone(), Arc::new(BincodeCodec), default_expire, "provider:positive:"),
            negative: ValueSetCache::with_namespace(backend.clone(), Arc::new(BincodeCodec), default_expire, "provider:negative:"),
            batching: BatchingValueSetCache::with_namespace(backend, Arc::new(BincodeCodec), default_expire, "provider:positive:"),
            ipni,
            legacy,
            ipni_timeout,
            max_batch_size,
            provider_id,
            publish_mutex: AsyncMutex::new(()),
        }
    }
}
