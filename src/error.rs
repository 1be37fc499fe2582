//! Crate-wide error taxonomy (spec §7).
//!
//! Each component keeps a narrow local error enum (`CacheError`,
//! `QueueError`, `ClaimFinderError`, `ProviderIndexError`, ...) scoped to
//! what can actually go wrong in that module. [`IndexingError`] is the
//! crate boundary type those convert into.

use thiserror::Error;

/// Crate-wide error kind, mirroring the taxonomy in spec.md §7.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Cache or store miss; callers that hit this should fall back, not
    /// propagate it further up (spec: "Yes — triggers fallback path").
    #[error("key not found")]
    KeyNotFound,

    /// A claim fetch failed, either at the network layer or because the
    /// returned claim's id did not match the id requested.
    #[error("claim fetch error: {0}")]
    ClaimFetchError(String),

    /// A bounded job queue refused new work because it is shutting down.
    #[error("queue is shutting down")]
    QueueShutdown,

    /// A query-result archive did not have exactly one root block.
    #[error("expected exactly one root block, found {0}")]
    WrongRootCount(usize),

    /// A query-result archive had no root block at all.
    #[error("archive has no root block")]
    NoRootBlock,

    /// `publish`/`cache` was invoked with a claim kind that is not
    /// recognized for that operation.
    #[error("unrecognized claim for this operation")]
    UnrecognizedClaim,

    /// The upstream publisher reported that the exact advertisement already
    /// exists; callers treat this as success (spec: "swallowed in Publish").
    #[error("advertisement already exists")]
    AlreadyAdvertised,

    /// The upstream index call exceeded its time budget; treated as an
    /// empty result, not a hard failure.
    #[error("upstream index call timed out")]
    IpniTimeout,

    /// Both the upstream index and the legacy adapter failed; their errors
    /// are joined rather than one masking the other.
    #[error("all provider sources failed: upstream: {upstream}; legacy: {legacy}")]
    SourcesFailed { upstream: String, legacy: String },

    /// Escape hatch for I/O, (de)serialization, and other infrastructure
    /// failures that should propagate immediately rather than recover.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IndexingError>;

impl IndexingError {
    /// True for errors the spec classifies as locally recoverable
    /// (§7 "Local recovery?" column).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IndexingError::KeyNotFound
                | IndexingError::AlreadyAdvertised
                | IndexingError::IpniTimeout
        )
    }
}
