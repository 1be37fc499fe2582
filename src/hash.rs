//! Content hashes, CIDs, and context-id derivation.
//!
//! A [`Hash`] is the raw multihash byte string used everywhere in this crate
//! as the primary lookup key (spec glossary: "Hash"). A [`Cid`] wraps a
//! multihash with a codec tag; for lookup purposes a CID is treated as its
//! underlying multihash (glossary: "CID").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Multihash code for the identity hash function: the digest bytes *are* the
/// payload, no hashing performed. CIDs built over this code let small claims
/// travel inline without a network fetch (spec §4.4, "Identity-CID wrapper").
pub const IDENTITY_CODE: u64 = 0x00;

/// Multihash code used for content hashed with BLAKE3-256 in this service.
pub const BLAKE3_CODE: u64 = 0x1e;

/// Raw multihash bytes identifying a piece of content.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// Wrap raw multihash bytes without validation.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Compute the BLAKE3 multihash of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        let mut buf = Vec::with_capacity(2 + 32);
        write_varint(BLAKE3_CODE, &mut buf);
        write_varint(32, &mut buf);
        buf.extend_from_slice(digest.as_bytes());
        Self(buf)
    }

    /// Build an identity-hash CID wrapping `payload` directly.
    pub fn identity(payload: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(2 + payload.len());
        write_varint(IDENTITY_CODE, &mut buf);
        write_varint(payload.len() as u64, &mut buf);
        buf.extend_from_slice(payload);
        Self(buf)
    }

    /// Raw multihash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// If this hash uses the identity multihash code, return its payload
    /// without any I/O. Used by the claim finder's identity-CID fast path
    /// (spec §4.4, §9 "Identity-CID shortcut").
    pub fn identity_payload(&self) -> Option<&[u8]> {
        let (code, rest) = read_varint(&self.0)?;
        if code != IDENTITY_CODE {
            return None;
        }
        let (len, payload) = read_varint(rest)?;
        if payload.len() as u64 != len {
            return None;
        }
        Some(payload)
    }

    /// Lowercase hex encoding, used for log fields and cache keys.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Base64 (URL-safe, no padding) encoding, used where a hash travels as
    /// a query parameter or appears inside a retrieval URL.
    pub fn to_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(s)
            .map(Self)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// A versioned identifier wrapping a codec and a hash. Treated as a
/// multihash for lookup purposes (glossary: "CID").
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct Cid {
    pub codec: u64,
    pub hash: Hash,
}

impl Cid {
    pub fn new(codec: u64, hash: Hash) -> Self {
        Self { codec, hash }
    }

    /// Treat this CID as a plain multihash lookup key.
    pub fn as_hash(&self) -> &Hash {
        &self.hash
    }
}

/// Opaque scoping key a provider advertisement is stored under: either a bare
/// [`Hash`] or `H(space ‖ hash)` (spec §3 "Context ID").
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(Vec<u8>);

impl ContextId {
    /// Context id scoped to `space`, or the bare hash if `space` is absent
    /// (spec §4.6.4: "context id from (space, hash) if space present else
    /// hash").
    pub fn derive(space: Option<&[u8]>, hash: &Hash) -> Self {
        match space {
            Some(space) => {
                let mut buf = Vec::with_capacity(space.len() + hash.as_bytes().len());
                buf.extend_from_slice(space);
                buf.extend_from_slice(hash.as_bytes());
                Self(blake3::hash(&buf).as_bytes().to_vec())
            }
            None => Self(hash.as_bytes().to_vec()),
        }
    }

    /// Context id derived directly from raw bytes (used when a provider
    /// result's metadata already carries an `index_cid`/`equals_cid`).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Reinterpret this context id as a [`Hash`] for use as a follow-up
    /// lookup key (spec §4.7 point 3, Equals handling: "spawn
    /// `(contextID-as-hash, ...)`").
    pub fn as_hash(&self) -> Hash {
        Hash::from_bytes(self.0.clone())
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for ContextId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn read_varint(input: &[u8]) -> Option<(u64, &[u8])> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in input.iter().enumerate() {
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((value, &input[i + 1..]));
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trip() {
        let h = Hash::identity(b"hello claim bytes");
        assert_eq!(h.identity_payload(), Some(b"hello claim bytes".as_slice()));
    }

    #[test]
    fn digest_is_not_identity() {
        let h = Hash::digest(b"content");
        assert_eq!(h.identity_payload(), None);
    }

    #[test]
    fn context_id_differs_by_space() {
        let hash = Hash::digest(b"content");
        let a = ContextId::derive(Some(b"space-a"), &hash);
        let b = ContextId::derive(Some(b"space-b"), &hash);
        let bare = ContextId::derive(None, &hash);
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(bare.as_bytes(), hash.as_bytes());
    }

    #[test]
    fn base64_round_trip() {
        let h = Hash::digest(b"round trip me");
        let encoded = h.to_base64();
        let decoded = Hash::from_base64(&encoded).unwrap();
        assert_eq!(h, decoded);
    }
}
