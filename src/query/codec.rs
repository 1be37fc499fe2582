//! Query Result archive codec (spec §6 "Query Result archive"): a
//! single-root, content-addressed archive. The real CAR wire format is an
//! external, opaque concern (spec §1); this module only owns the minimal
//! outer framing this service is responsible for producing — a root block
//! referencing child blocks by content hash, each length-prefixed.
//!
//! Root block shape follows spec §6 exactly: v0.1
//! `{claims: [link], indexes?: {keys:[string], values:{string→link}}}` or
//! v0.2 `{claims, indexes?, messages:[string]}`; decoding accepts both.

use crate::error::IndexingError;
use crate::hash::{ContextId, Hash};
use crate::model::{Claim, QueryResult, ShardedDagIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// bincode is not self-describing, so the two root-block shapes cannot be
// told apart with `#[serde(untagged)]` (which relies on trial-and-error
// deserialization against a self-describing format). Decoding instead
// tries the v0.2 shape first and falls back to v0.1 on failure.
#[derive(Serialize, Deserialize)]
struct RootBlockV2 {
    claims: Vec<Hash>,
    indexes: Option<HashMap<String, Hash>>,
    messages: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct RootBlockV1 {
    claims: Vec<Hash>,
    indexes: Option<IndexesV1>,
}

#[derive(Serialize, Deserialize)]
struct IndexesV1 {
    keys: Vec<String>,
    values: HashMap<String, Hash>,
}

fn context_id_key(context_id: &ContextId) -> String {
    hex::encode(context_id.as_bytes())
}

/// Encode `result` as a v0.2 archive (spec §6).
pub fn encode(result: &QueryResult) -> Result<Vec<u8>, IndexingError> {
    let mut blocks = Vec::new();
    let mut claim_links = Vec::with_capacity(result.claims.len());
    for claim in &result.claims {
        let bytes = bincode::serialize(claim).map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        claim_links.push(claim.id().clone());
        blocks.push((claim.id().clone(), bytes));
    }

    let mut index_links = HashMap::with_capacity(result.indexes.len());
    for (context_id, index) in &result.indexes {
        let bytes = bincode::serialize(index).map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        let link = Hash::digest(&bytes);
        index_links.insert(context_id_key(context_id), link.clone());
        blocks.push((link, bytes));
    }

    let root = RootBlockV2 {
        claims: claim_links,
        indexes: if index_links.is_empty() { None } else { Some(index_links) },
        messages: result.messages.clone(),
    };
    let root_bytes = bincode::serialize(&root).map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;

    let mut archive = Vec::new();
    write_frame(&mut archive, &root_bytes);
    for (hash, bytes) in &blocks {
        write_frame(&mut archive, hash.as_bytes());
        write_frame(&mut archive, bytes);
    }
    Ok(archive)
}

/// Decode an archive produced by [`encode`], or an upstream-compatible
/// v0.1 archive, into a [`QueryResult`] (spec §6: "Decoders accept both").
pub fn decode(bytes: &[u8]) -> Result<QueryResult, IndexingError> {
    let mut cursor = bytes;
    let root_bytes = read_frame(&mut cursor).ok_or(IndexingError::NoRootBlock)?;

    let mut child_blocks: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
    let mut root_count = 0usize;
    while let Some(hash_bytes) = read_frame(&mut cursor) {
        root_count += 1;
        let content = read_frame(&mut cursor).ok_or(IndexingError::WrongRootCount(root_count))?;
        child_blocks.insert(hash_bytes.to_vec(), content.to_vec());
    }

    let (claim_links, index_links, messages) = if let Ok(v2) = bincode::deserialize::<RootBlockV2>(root_bytes) {
        (v2.claims, v2.indexes.unwrap_or_default(), v2.messages)
    } else {
        let v1: RootBlockV1 =
            bincode::deserialize(root_bytes).map_err(|_| IndexingError::NoRootBlock)?;
        let indexes = v1
            .indexes
            .map(|ix| ix.keys.into_iter().zip(ix.values.into_values()).collect())
            .unwrap_or_default();
        (v1.claims, indexes, Vec::new())
    };

    let mut result = QueryResult::empty();
    result.messages = messages;

    for link in claim_links {
        let bytes = child_blocks
            .get(link.as_bytes())
            .ok_or(IndexingError::NoRootBlock)?;
        let claim: Claim =
            bincode::deserialize(bytes).map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        result.add_claim(claim);
    }

    for (context_hex, link) in index_links {
        let bytes = child_blocks
            .get(link.as_bytes())
            .ok_or(IndexingError::NoRootBlock)?;
        let index = ShardedDagIndex::extract(bytes)?;
        let context_id = ContextId::from_bytes(hex::decode(&context_hex).unwrap_or_default());
        result.add_index(context_id, index);
    }

    Ok(result)
}

fn write_frame(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_frame<'a>(cursor: &mut &'a [u8]) -> Option<&'a [u8]> {
    if cursor.len() < 4 {
        return None;
    }
    let (len_bytes, rest) = cursor.split_at(4);
    let len = u32::from_be_bytes(len_bytes.try_into().ok()?) as usize;
    if rest.len() < len {
        return None;
    }
    let (frame, rest) = rest.split_at(len);
    *cursor = rest;
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap as Map;

    proptest! {
        // Round-trip law (spec §8): `extract(archive(buildQueryResult(C, I, M))) == (C, I, M)`
        // for any claim/message set, here specialized to equals claims since
        // every `Claim` variant shares the same archival path.
        #[test]
        fn encode_decode_round_trips_arbitrary_equals_claims_and_messages(
            seeds in proptest::collection::vec(any::<[u8; 4]>(), 0..8),
            messages in proptest::collection::vec("[a-z]{0,12}", 0..4),
        ) {
            let mut result = QueryResult::empty();
            for (i, seed) in seeds.iter().enumerate() {
                result.add_claim(Claim::Equals {
                    root: Hash::digest(&[b'r', i as u8, seed[0], seed[1]]),
                    content_hash: Hash::digest(&[b'c', i as u8, seed[1], seed[2]]),
                    equals_cid: Hash::digest(&[b'e', i as u8, seed[2], seed[3]]),
                    expiration: None,
                });
            }
            result.messages = messages.clone();

            let archive = encode(&result).unwrap();
            let decoded = decode(&archive).unwrap();

            prop_assert_eq!(decoded.claims.len(), result.claims.len());
            prop_assert_eq!(decoded.messages, messages);
        }
    }

    #[test]
    fn round_trips_claims_and_indexes() {
        let mut result = QueryResult::empty();
        result.add_claim(Claim::Equals {
            root: Hash::digest(b"root"),
            content_hash: Hash::digest(b"content"),
            equals_cid: Hash::digest(b"equals"),
            expiration: None,
        });
        let mut slices = Map::new();
        slices.insert(Hash::digest(b"slice"), (0u64, 10u64));
        let mut shards = Map::new();
        shards.insert(Hash::digest(b"shard"), slices);
        result.add_index(
            ContextId::derive(None, &Hash::digest(b"ctx")),
            ShardedDagIndex::new(shards),
        );
        result.messages.push("partial result".to_string());

        let archive = encode(&result).unwrap();
        let decoded = decode(&archive).unwrap();

        assert_eq!(decoded.claims.len(), 1);
        assert_eq!(decoded.indexes.len(), 1);
        assert_eq!(decoded.messages, vec!["partial result".to_string()]);
    }

    #[test]
    fn empty_archive_has_no_root_block() {
        assert!(matches!(decode(&[]), Err(IndexingError::NoRootBlock)));
    }
}
