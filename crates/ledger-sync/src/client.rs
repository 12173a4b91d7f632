//! HTTP client for a peer's `changeSets` endpoint.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use ledger_contracts::{
    config::PeerConfig,
    error::{LedgerError, LedgerResult},
};

#[derive(Debug, Clone)]
pub struct PeerClient {
    base_url: String,
    api_key: String,
    api_key_header: String,
    client: Client,
}

impl PeerClient {
    /// Build a client whose every request times out after `timeout`.
    pub fn new(peer: &PeerConfig, api_key_header: &str, timeout: Duration) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::ConfigError {
                reason: format!("cannot build HTTP client for '{}': {}", peer.url, e),
            })?;
        Ok(Self {
            base_url: peer.url.trim_end_matches('/').to_string(),
            api_key: peer.api_key.clone(),
            api_key_header: api_key_header.to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET <base>/changeSets[?skipUntil=<hash>]`, expecting a JSON array of
    /// envelopes with status 200.
    pub async fn fetch_change_sets(&self, skip_until: Option<&str>) -> LedgerResult<Vec<Value>> {
        let url = format!("{}/changeSets", self.base_url);
        let mut request = self.client.get(&url).header(ACCEPT, "application/json");
        if !self.api_key.is_empty() {
            request = request.header(self.api_key_header.as_str(), self.api_key.as_str());
        }
        if let Some(hash) = skip_until {
            request = request.query(&[("skipUntil", hash)]);
        }

        let resp = request.send().await.map_err(|e| self.unavailable(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(self.unavailable(format!("changeSets request failed: {}", resp.status())));
        }

        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| self.unavailable(format!("changeSets body is not an array: {}", e)))
    }

    fn unavailable(&self, reason: String) -> LedgerError {
        LedgerError::PeerUnavailable {
            peer: self.base_url.clone(),
            reason,
        }
    }
}
