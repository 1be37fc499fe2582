//! Service identity keypair and self-issued delegation signing.
//!
//! Ed25519 over Curve25519, with zeroize-on-drop for the private key.
//! Narrowed to exactly what the query engine needs — signing a synthesized
//! location commitment for the `standard_compressed` query variant (spec
//! §4.7 point 5) and validating that a location commitment being published
//! is self-issued, unrevoked,
//! and unexpired (spec §4.7 "Publish").
//!
//! Writing or validating the *claim* crypto format itself is out of scope
//! (spec §1 Non-goals); this module only covers the minimal signing surface
//! the query engine's own synthesis path requires.

use crate::model::Claim;
use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::ZeroizeOnDrop;

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("claim is expired")]
    Expired,
    #[error("claim was not issued by this service")]
    NotSelfIssued,
}

/// This service's own signing identity.
#[derive(ZeroizeOnDrop)]
pub struct ServiceIdentity {
    signing_key: SigningKey,
    #[zeroize(skip)]
    verifying_key: VerifyingKey,
    #[zeroize(skip)]
    did: String,
}

impl ServiceIdentity {
    /// Generate a fresh identity. Production deployments load a persisted
    /// key instead; that persistence is a configuration/boundary concern
    /// left to the caller.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let did = format!("did:key:z{}", hex::encode(verifying_key.as_bytes()));
        Self {
            signing_key,
            verifying_key,
            did,
        }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Sign a synthesized location commitment on behalf of the service
    /// (spec §4.7 point 5: "signed by the service identity"). The `issuer`
    /// field is stamped with this identity's DID so downstream validation
    /// (`validate_self_issued`) can confirm provenance.
    pub fn sign_location_claim(
        &self,
        root: crate::hash::Hash,
        content_hash: crate::hash::Hash,
        urls: Vec<String>,
        range: Option<crate::model::Range>,
    ) -> Claim {
        Claim::Location {
            root,
            content_hash,
            urls,
            range,
            space: None,
            expiration: None,
            issuer: Some(self.did.clone()),
        }
    }

    /// Validate that `claim` was self-issued by this identity, is unexpired,
    /// and (trivially, since this crate does not model revocation storage)
    /// unrevoked. Required before Publish enumerates an index claim's
    /// slices (spec §4.7 "Publish": "validate the signing delegation of
    /// that location commitment (self-issued, unrevoked, unexpired)").
    pub fn validate_self_issued(&self, claim: &Claim) -> Result<(), SigningError> {
        if claim.is_expired(Utc::now()) {
            return Err(SigningError::Expired);
        }
        match claim {
            Claim::Location { issuer, .. } => {
                if issuer.as_deref() != Some(self.did.as_str()) {
                    return Err(SigningError::NotSelfIssued);
                }
                Ok(())
            }
            _ => Err(SigningError::NotSelfIssued),
        }
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SigningError> {
        self.verifying_key
            .verify(message, signature)
            .map_err(|_| SigningError::VerificationFailed)
    }
}
