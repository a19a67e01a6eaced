//! JSON-RPC page-key resolver
//!
//! Resolves `current` out-of-band with a JSON-RPC `ledger` call for the latest
//! validated ledger. The run then starts one below it, so the first page is
//! read from a ledger every node has already closed.

use crate::coordinator::{Backoff, RetryPolicy};
use crate::error::{Error, Result};
use crate::types::{value_at_path, JsonValue, PageKey};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolver settings
#[derive(Debug, Clone)]
pub struct RpcResolverConfig {
    /// JSON-RPC endpoint
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Failure handling
    pub retry: RetryPolicy,
    /// User agent string
    pub user_agent: String,
}

impl RpcResolverConfig {
    /// Defaults for an endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Resolves `current` to a concrete page key over HTTP
#[derive(Debug, Clone)]
pub struct RpcResolver {
    client: Client,
    config: RpcResolverConfig,
}

impl RpcResolver {
    /// Create a resolver
    pub fn new(config: RpcResolverConfig) -> Result<Self> {
        url::Url::parse(&config.url)?;
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Latest validated ledger index
    pub async fn latest_validated(&self) -> Result<u64> {
        let mut backoff = Backoff::new(self.config.retry.clone());
        loop {
            match self.fetch_validated().await {
                Ok(index) => return Ok(index),
                Err(e) if e.is_retryable() => {
                    let delay = backoff.next_delay(&e)?;
                    warn!(url = %self.config.url, error = %e, delay = ?delay, "validated ledger lookup failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Resolve `current` to one below the latest validated index; concrete
    /// keys are returned unchanged
    pub async fn resolve(&self, page_key: PageKey) -> Result<PageKey> {
        match page_key {
            PageKey::Index(_) => Ok(page_key),
            PageKey::Current => {
                let latest = self.latest_validated().await?;
                let start = latest.saturating_sub(1);
                info!(latest, start, "resolved current page key");
                Ok(PageKey::Index(start))
            }
        }
    }

    async fn fetch_validated(&self) -> Result<u64> {
        let body = json!({
            "method": "ledger",
            "params": [{"ledger_index": "validated"}]
        });
        debug!(url = %self.config.url, "requesting validated ledger");
        let response = self.client.post(&self.config.url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), text));
        }

        let payload: JsonValue = response.json().await?;
        let rpc_status = value_at_path(&payload, "result.status").and_then(JsonValue::as_str);
        if rpc_status != Some("success") {
            let error = value_at_path(&payload, "result.error")
                .and_then(JsonValue::as_str)
                .unwrap_or("missing status");
            return Err(Error::transport_status("validated", error));
        }

        ["result.ledger_index", "result.ledger.ledger_index"]
            .iter()
            .find_map(|path| value_at_path(&payload, path).and_then(index_of))
            .ok_or_else(|| Error::malformed("ledger response without a ledger index"))
    }
}

fn index_of(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}
