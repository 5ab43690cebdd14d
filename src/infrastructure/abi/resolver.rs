//! Sourcify lookups for contracts the indexer has no source for

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;

const SOURCIFY_URL: &str = "https://sourcify.dev/server";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ResolvedAbi {
    pub abi_json: String,
    pub contract_name: Option<String>,
    /// `exact_match` or `match`, as reported by Sourcify
    pub match_kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContractResponse {
    #[serde(default)]
    abi: Option<serde_json::Value>,
    #[serde(default)]
    compilation: Option<Compilation>,
    #[serde(default, rename = "match")]
    match_kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Compilation {
    #[serde(default)]
    name: Option<String>,
}

/// Sourcify v2 client; answers, misses included, are remembered per process
pub struct AbiResolver {
    http: reqwest::Client,
    base_url: String,
    seen: RwLock<HashMap<(u64, Address), Option<ResolvedAbi>>>,
}

impl AbiResolver {
    pub fn new() -> Self {
        Self::with_base_url(SOURCIFY_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            seen: RwLock::new(HashMap::new()),
        }
    }

    fn contract_url(&self, chain_id: u64, address: Address) -> String {
        format!(
            "{}/v2/contract/{}/{:#x}?fields=abi,compilation",
            self.base_url, chain_id, address
        )
    }

    /// ABI of a verified contract; `None` when Sourcify has no match
    pub async fn lookup_abi(&self, chain_id: u64, address: Address) -> Result<Option<ResolvedAbi>> {
        if let Some(known) = self.seen.read().await.get(&(chain_id, address)) {
            return Ok(known.clone());
        }

        let resolved = self.fetch(chain_id, address).await?;
        tracing::debug!(chain_id, %address, found = resolved.is_some(), "sourcify lookup");
        self.seen
            .write()
            .await
            .insert((chain_id, address), resolved.clone());
        Ok(resolved)
    }

    async fn fetch(&self, chain_id: u64, address: Address) -> Result<Option<ResolvedAbi>> {
        let response = self
            .http
            .get(self.contract_url(chain_id, address))
            .send()
            .await
            .context("Sourcify request failed")?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if !status.is_success() => bail!("Sourcify returned HTTP {}", status),
            _ => {
                let body: ContractResponse = response
                    .json()
                    .await
                    .context("malformed Sourcify response")?;
                Ok(into_resolved(body))
            }
        }
    }
}

impl Default for AbiResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn into_resolved(body: ContractResponse) -> Option<ResolvedAbi> {
    let abi = body.abi.filter(|abi| abi.is_array())?;
    Some(ResolvedAbi {
        abi_json: abi.to_string(),
        contract_name: body.compilation.and_then(|c| c.name),
        match_kind: body.match_kind,
    })
}
