//! HTTP claim fetcher — the innermost link in the C4 decorator chain.
//!
//! Plain GET, status check, body decode — no retry or backoff; the
//! decorator chain's cache and store layers are what keep the hot path off
//! the network.

use super::{ClaimArchiveCodec, ClaimFinder, ClaimFinderError};
use crate::hash::Hash;
use crate::model::Claim;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct SimpleFetcher {
    client: reqwest::Client,
    codec: Arc<dyn ClaimArchiveCodec>,
}

impl SimpleFetcher {
    pub fn new(codec: Arc<dyn ClaimArchiveCodec>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with a static config"),
            codec,
        }
    }
}

#[async_trait]
impl ClaimFinder for SimpleFetcher {
    #[instrument(skip(self), fields(claim_id = %claim_id, fetch_url = %fetch_url))]
    async fn find(&self, claim_id: &Hash, fetch_url: &str) -> Result<Claim, ClaimFinderError> {
        let response = self
            .client
            .get(fetch_url)
            .send()
            .await
            .map_err(|e| ClaimFinderError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClaimFinderError::HttpStatus { status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClaimFinderError::FetchFailed(e.to_string()))?;
        let claim = self.codec.extract_claim(&bytes)?;

        if claim.id() != claim_id {
            return Err(ClaimFinderError::IdMismatch {
                requested: claim_id.to_string(),
                found: claim.id().to_string(),
            });
        }

        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::BincodeClaimCodec;

    #[tokio::test]
    async fn mismatched_fetch_url_surfaces_http_status() {
        let fetcher = SimpleFetcher::new(Arc::new(BincodeClaimCodec));
        let id = Hash::digest(b"whatever");
        let result = fetcher.find(&id, "http://127.0.0.1:1/no-such-host").await;
        assert!(result.is_err());
    }
}
