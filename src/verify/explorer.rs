/// WhatsOnChain explorer client.
///
/// Endpoint: `GET {base}/v1/bsv/{main|test}/tx/{txid}/opreturn`, which
/// answers with a JSON array of `{ "n": <output index>, "hex": <script> }`.
/// Freshly broadcast transactions can 404 for a few seconds until the
/// explorer indexes them; callers poll.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Explorer, OpReturnEntry};
use crate::anchor::Chain;
use crate::error::{AnchorError, Result};

/// Default public API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.whatsonchain.com";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for the WhatsOnChain API.
#[derive(Debug, Clone)]
pub struct WhatsOnChainConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
}

impl Default for WhatsOnChainConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

pub struct WhatsOnChain {
    client: Client,
    config: WhatsOnChainConfig,
}

impl WhatsOnChain {
    pub fn new(config: WhatsOnChainConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Use a preconfigured HTTP client (proxy, TLS roots, ...).
    pub fn with_client(config: WhatsOnChainConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn opreturn_url(&self, chain: Chain, txid: &str) -> String {
        format!(
            "{}/v1/bsv/{}/tx/{}/opreturn",
            self.config.base_url.trim_end_matches('/'),
            chain.as_str(),
            txid
        )
    }
}

#[async_trait]
impl Explorer for WhatsOnChain {
    fn name(&self) -> &str {
        "WhatsOnChain"
    }

    async fn op_return_outputs(&self, chain: Chain, txid: &str) -> Result<Vec<OpReturnEntry>> {
        let url = self.opreturn_url(chain, txid);

        let resp = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AnchorError::Lookup(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnchorError::Lookup(format!(
                "GET {url} returned {status}: {}",
                body.trim()
            )));
        }

        resp.json()
            .await
            .map_err(|e| AnchorError::Lookup(format!("Failed to parse opreturn response: {e}")))
    }
}
