//! Etherscan-compatible indexer client with in-memory ABI caching

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{ContractSource, IndexedTransaction, IndexerClient};
use crate::infrastructure::ethereum::{parse_raw_transaction, RawTransaction};

const NOT_VERIFIED: &str = "not verified";

/// `{status, message, result}` wrapper around every module response
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

/// Entry of a `getsourcecode` result
#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
    #[serde(rename = "ABI", default)]
    abi: String,
    #[serde(rename = "ContractName", default)]
    contract_name: String,
    #[serde(rename = "Proxy", default)]
    proxy: String,
    #[serde(rename = "Implementation", default)]
    implementation: String,
}

/// JSON-RPC style wrapper used by the `proxy` module
#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

pub struct EtherscanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: Option<u64>,
    /// Cache: address -> ABI (None when unverified)
    abi_cache: Arc<RwLock<HashMap<Address, Option<String>>>>,
}

impl EtherscanClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, chain_id: Option<u64>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key,
            chain_id,
            abi_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn get(&self, params: &[(&str, String)]) -> Result<reqwest::Response> {
        let mut query: Vec<(&str, String)> = params.to_vec();
        if let Some(chain_id) = self.chain_id {
            query.push(("chainid", chain_id.to_string()));
        }
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }

        let action = params
            .iter()
            .find(|(k, _)| *k == "action")
            .map(|(_, v)| v.as_str())
            .unwrap_or("");
        tracing::debug!(indexer = %self.base_url, action, "indexer request");

        let response = self
            .http
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to query indexer ({})", action))?;

        if !response.status().is_success() {
            bail!("indexer returned HTTP {} for {}", response.status(), action);
        }
        Ok(response)
    }

    async fn envelope(&self, params: &[(&str, String)]) -> Result<Envelope> {
        self.get(params)
            .await?
            .json()
            .await
            .context("Failed to parse indexer response")
    }
}

#[async_trait::async_trait]
impl IndexerClient for EtherscanClient {
    async fn contract_abi(&self, address: Address) -> Result<Option<String>> {
        // Check cache first
        {
            let cache = self.abi_cache.read().await;
            if let Some(abi) = cache.get(&address) {
                return Ok(abi.clone());
            }
        }

        let data = self
            .envelope(&[
                ("module", "contract".to_string()),
                ("action", "getabi".to_string()),
                ("address", format!("{:#x}", address)),
            ])
            .await?;

        let result = data.result.as_str().unwrap_or_default().to_string();
        let abi = if data.status == "1" && result.trim_start().starts_with('[') {
            Some(result)
        } else if result.to_lowercase().contains(NOT_VERIFIED) {
            None
        } else {
            bail!("getabi failed: {} ({})", data.message, result);
        };

        // Cache result (including None for unverified)
        {
            let mut cache = self.abi_cache.write().await;
            cache.insert(address, abi.clone());
        }

        Ok(abi)
    }

    async fn contract_source(&self, address: Address) -> Result<Option<ContractSource>> {
        let data = self
            .envelope(&[
                ("module", "contract".to_string()),
                ("action", "getsourcecode".to_string()),
                ("address", format!("{:#x}", address)),
            ])
            .await?;

        if data.status != "1" {
            bail!("getsourcecode failed: {} ({})", data.message, data.result);
        }

        let entries: Vec<SourceEntry> =
            serde_json::from_value(data.result).context("Unexpected getsourcecode result")?;
        let Some(entry) = entries.into_iter().next() else {
            return Ok(None);
        };

        // Unverified contracts come back as an entry with empty source
        if entry.source_code.trim().is_empty() && !entry.abi.trim_start().starts_with('[') {
            return Ok(None);
        }

        let implementation = entry
            .implementation
            .trim()
            .parse::<Address>()
            .ok()
            .filter(|addr| !addr.is_zero());

        Ok(Some(ContractSource {
            contract_name: Some(entry.contract_name).filter(|name| !name.trim().is_empty()),
            abi: Some(entry.abi).filter(|abi| abi.trim_start().starts_with('[')),
            is_proxy: entry.proxy.trim() == "1",
            implementation,
        }))
    }

    async fn transactions(
        &self,
        address: Address,
        page: u32,
        offset: usize,
    ) -> Result<Vec<IndexedTransaction>> {
        let data = self
            .envelope(&[
                ("module", "account".to_string()),
                ("action", "txlist".to_string()),
                ("address", format!("{:#x}", address)),
                ("startblock", "0".to_string()),
                ("endblock", "99999999".to_string()),
                ("page", page.to_string()),
                ("offset", offset.to_string()),
                ("sort", "desc".to_string()),
            ])
            .await?;

        if data.status != "1" {
            // An empty history is reported as status 0 with an empty list
            if data.result.as_array().is_some_and(|items| items.is_empty())
                || data.message.to_lowercase().contains("no transactions found")
            {
                return Ok(Vec::new());
            }
            bail!("txlist failed: {} ({})", data.message, data.result);
        }

        serde_json::from_value(data.result).context("Unexpected txlist result")
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<RawTransaction>> {
        let data: ProxyResponse = self
            .get(&[
                ("module", "proxy".to_string()),
                ("action", "eth_getTransactionByHash".to_string()),
                ("txhash", format!("{:#x}", hash)),
            ])
            .await?
            .json()
            .await
            .context("Failed to parse indexer proxy response")?;

        if let Some(error) = data.error {
            bail!("eth_getTransactionByHash via indexer failed: {}", error);
        }
        if data.result.is_null() {
            return Ok(None);
        }
        // Rate-limit and key errors come back as a plain string result
        if let Some(message) = data.result.as_str() {
            bail!("eth_getTransactionByHash via indexer failed: {}", message);
        }

        parse_raw_transaction(&data.result)
            .map(Some)
            .context("malformed transaction in indexer proxy response")
    }

    fn name(&self) -> String {
        self.base_url.clone()
    }
}
