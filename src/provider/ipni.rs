//! Upstream content-routing network client (spec glossary: "Upstream index /
//! IPNI"): `findProviders` plus the advertisement-chain publishing API.
//!
//! Modeled as a trait over the wire, with a concrete `reqwest`-backed
//! implementation, so the provider index and notifier can be tested against
//! an in-process stub without a network round trip.

use crate::error::IndexingError;
use crate::hash::{ContextId, Hash};
use crate::model::ProviderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry in the upstream's backward-linked advertisement chain (spec
/// §6 "Advertisement chain (remote)").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Advertisement {
    pub previous: Option<Hash>,
    pub entries: Vec<Hash>,
    pub context_id: ContextId,
    pub metadata: Vec<u8>,
    pub provider: String,
    pub is_removal: bool,
}

#[async_trait]
pub trait IpniClient: Send + Sync {
    async fn find_providers(&self, hash: &Hash) -> Result<Vec<ProviderResult>, IndexingError>;

    /// Publish an advertisement, returning the new chain head. Implementors
    /// return [`IndexingError::AlreadyAdvertised`] when the exact
    /// advertisement already exists (spec §4.6.2: "swallowed in Publish").
    async fn publish(&self, ad: Advertisement) -> Result<Hash, IndexingError>;

    /// Current advertisement-chain head for `provider`, if it has ever
    /// published (spec §4.6.3).
    async fn advertisement_head(&self, provider: &str) -> Result<Option<Hash>, IndexingError>;

    async fn fetch_advertisement(&self, head: &Hash) -> Result<Advertisement, IndexingError>;
}

/// `reqwest`-backed [`IpniClient`]: plain request/JSON-response calls
/// against the upstream content-routing network.
pub struct HttpIpniClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIpniClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl IpniClient for HttpIpniClient {
    async fn find_providers(&self, hash: &Hash) -> Result<Vec<ProviderResult>, IndexingError> {
        let url = format!("{}/cid/{}", self.base_url, hash.to_base64());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(IndexingError::Other(anyhow::anyhow!(
                "upstream index returned status {}",
                response.status()
            )));
        }
        response
            .json::<Vec<ProviderResult>>()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))
    }

    async fn publish(&self, ad: Advertisement) -> Result<Hash, IndexingError> {
        let url = format!("{}/ingest/announce", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ad)
            .send()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Err(IndexingError::AlreadyAdvertised);
        }
        if !response.status().is_success() {
            return Err(IndexingError::Other(anyhow::anyhow!(
                "advertisement publish returned status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        Ok(Hash::from_bytes(bytes.to_vec()))
    }

    async fn advertisement_head(&self, provider: &str) -> Result<Option<Hash>, IndexingError> {
        let url = format!("{}/providers/{}/head", self.base_url, provider);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        Ok(Some(Hash::from_bytes(bytes.to_vec())))
    }

    async fn fetch_advertisement(&self, head: &Hash) -> Result<Advertisement, IndexingError> {
        let url = format!("{}/ad/{}", self.base_url, head.to_base64());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))?;
        response
            .json::<Advertisement>()
            .await
            .map_err(|e| IndexingError::Other(anyhow::anyhow!(e)))
    }
}
