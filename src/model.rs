//! Core data model (spec §3): claims, provider results, queries, and the
//! sharded-DAG index.

use crate::hash::{ContextId, Hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Which claim codec a piece of metadata declares (spec §3 "Provider
/// Result"). Used to filter provider results by query type (spec §4.7
/// point 2) and to decide whether metadata is context-id-filterable
/// (spec §4.6.1 step 4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ClaimCodec {
    Location,
    Index,
    Equals,
}

/// Byte range `(offset, length)`.
pub type Range = (u64, u64);

/// Tagged union over the three provider-result metadata shapes (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ClaimMetadata {
    LocationCommitment {
        claim_cid: Hash,
        range: Option<Range>,
        expiration: Option<DateTime<Utc>>,
    },
    IndexClaim {
        index_cid: Hash,
        claim_cid: Hash,
        expiration: Option<DateTime<Utc>>,
    },
    EqualsClaim {
        equals_cid: Hash,
        claim_cid: Hash,
        expiration: Option<DateTime<Utc>>,
    },
}

impl ClaimMetadata {
    pub fn codec(&self) -> ClaimCodec {
        match self {
            ClaimMetadata::LocationCommitment { .. } => ClaimCodec::Location,
            ClaimMetadata::IndexClaim { .. } => ClaimCodec::Index,
            ClaimMetadata::EqualsClaim { .. } => ClaimCodec::Equals,
        }
    }

    pub fn claim_cid(&self) -> &Hash {
        match self {
            ClaimMetadata::LocationCommitment { claim_cid, .. }
            | ClaimMetadata::IndexClaim { claim_cid, .. }
            | ClaimMetadata::EqualsClaim { claim_cid, .. } => claim_cid,
        }
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        match self {
            ClaimMetadata::LocationCommitment { expiration, .. }
            | ClaimMetadata::IndexClaim { expiration, .. }
            | ClaimMetadata::EqualsClaim { expiration, .. } => *expiration,
        }
    }

    /// Only location commitments can be filtered by a requester's subject
    /// spaces (spec §4.6.1 step 4: "but only for results whose metadata is
    /// filterable by context id (currently only location commitments)").
    pub fn filterable_by_context(&self) -> bool {
        matches!(self, ClaimMetadata::LocationCommitment { .. })
    }
}

/// A URL template carrying `{claim}` and `{blob}` placeholders (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderAddress {
    pub template: String,
}

impl ProviderAddress {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute `{claim}` with the base64 form of `claim`, if given.
    pub fn resolve_claim(&self, claim: &Hash) -> String {
        self.template.replace("{claim}", &claim.to_base64())
    }

    /// Substitute `{blob}` with the base64 form of `blob`, if given.
    pub fn resolve_blob(&self, blob: &Hash) -> String {
        self.template.replace("{blob}", &blob.to_base64())
    }
}

/// `(context_id, metadata_bytes, provider_addresses)` as returned by the
/// upstream index or synthesized by the legacy adapter (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderResult {
    pub context_id: ContextId,
    pub metadata: ClaimMetadata,
    pub provider_addresses: Vec<ProviderAddress>,
}

impl ProviderResult {
    /// First provider address, if any — most callers only need one.
    pub fn primary_address(&self) -> Option<&ProviderAddress> {
        self.provider_addresses.first()
    }
}

/// A signed delegation asserting one capability over a content subject
/// (spec §3 "Claim"). Cryptographic validity is outside this crate's scope
/// (spec §1 Non-goals); only the fields needed to drive the query engine
/// and write path are modeled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Claim {
    Location {
        root: Hash,
        content_hash: Hash,
        urls: Vec<String>,
        range: Option<Range>,
        space: Option<Vec<u8>>,
        expiration: Option<DateTime<Utc>>,
        issuer: Option<String>,
    },
    Index {
        root: Hash,
        content_cid: Hash,
        index_cid: Hash,
        expiration: Option<DateTime<Utc>>,
    },
    Equals {
        root: Hash,
        content_hash: Hash,
        equals_cid: Hash,
        expiration: Option<DateTime<Utc>>,
    },
}

impl Claim {
    /// Stable root identifier — the claim's own content hash (spec §3).
    pub fn id(&self) -> &Hash {
        match self {
            Claim::Location { root, .. } => root,
            Claim::Index { root, .. } => root,
            Claim::Equals { root, .. } => root,
        }
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        match self {
            Claim::Location { expiration, .. } => *expiration,
            Claim::Index { expiration, .. } => *expiration,
            Claim::Equals { expiration, .. } => *expiration,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration().map(|exp| exp <= now).unwrap_or(false)
    }
}

/// A lazy, queryable sharded-DAG index: for each shard, the byte offsets of
/// every slice it contains (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShardedDagIndex {
    shards: HashMap<Hash, HashMap<Hash, Range>>,
}

impl ShardedDagIndex {
    pub fn new(shards: HashMap<Hash, HashMap<Hash, Range>>) -> Self {
        Self { shards }
    }

    pub fn shards(&self) -> &HashMap<Hash, HashMap<Hash, Range>> {
        &self.shards
    }

    /// The first shard whose slice set contains `slice`, along with the
    /// slice's `(offset, length)` within that shard. Spec §4.7 point 3
    /// ("For every shard in the index whose slice set contains
    /// `*maybeIndexForHash`").
    pub fn shard_containing(&self, slice: &Hash) -> Option<(&Hash, Range)> {
        self.shards
            .iter()
            .find_map(|(shard, slices)| slices.get(slice).map(|range| (shard, *range)))
    }

    /// Every shard whose slice set contains `slice` (there should usually be
    /// exactly one, but the index format does not forbid duplicates).
    pub fn shards_containing<'a>(&'a self, slice: &'a Hash) -> impl Iterator<Item = &'a Hash> {
        self.shards
            .iter()
            .filter_map(move |(shard, slices)| slices.contains_key(slice).then_some(shard))
    }

    /// Encode to a single opaque blob whose content hash is the index CID.
    pub fn archive(&self) -> anyhow::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn extract(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Selector controlling which claim codecs a query pursues (spec §3, §4.7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum QueryType {
    Standard,
    Location,
    IndexOrLocation,
    StandardCompressed,
    Equals,
}

impl QueryType {
    /// Claim codecs this query type pursues (spec §4.7 point 2).
    pub fn target_claims(&self) -> HashSet<ClaimCodec> {
        use ClaimCodec::*;
        match self {
            QueryType::Standard | QueryType::StandardCompressed => {
                [Equals, Index, Location].into_iter().collect()
            }
            QueryType::Location => [Location].into_iter().collect(),
            QueryType::IndexOrLocation => [Index, Location].into_iter().collect(),
            QueryType::Equals => [Equals].into_iter().collect(),
        }
    }
}

/// `(type, hashes, subject_spaces, retrieval_proofs)` (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
    pub query_type: QueryType,
    pub hashes: Vec<Hash>,
    pub subject_spaces: Vec<Vec<u8>>,
    pub retrieval_proofs: Vec<Vec<u8>>,
}

impl Query {
    pub fn new(query_type: QueryType, hashes: Vec<Hash>) -> Self {
        Self {
            query_type,
            hashes,
            subject_spaces: Vec::new(),
            retrieval_proofs: Vec::new(),
        }
    }

    pub fn with_spaces(mut self, spaces: Vec<Vec<u8>>) -> Self {
        self.subject_spaces = spaces;
        self
    }
}

/// Content-addressed archive containing the claims and indexes found for a
/// query, plus any human-readable messages (spec §3, §6).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub claims: Vec<Claim>,
    pub indexes: HashMap<ContextId, ShardedDagIndex>,
    pub messages: Vec<String>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn add_claim(&mut self, claim: Claim) {
        if !self.claims.iter().any(|c| c.id() == claim.id()) {
            self.claims.push(claim);
        }
    }

    pub fn add_index(&mut self, context_id: ContextId, index: ShardedDagIndex) {
        self.indexes.entry(context_id).or_insert(index);
    }
}
