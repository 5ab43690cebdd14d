//! Chain client abstraction and Alloy implementations
//!
//! Uses raw JSON requests for blocks, transactions and receipts so that
//! chains with non-standard transaction types (Kaia, OP stack) still parse.

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, B256, U256, U64};
use alloy::providers::{
    fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::rpc::types::{Filter, TransactionRequest};
use anyhow::{Context, Result};

use crate::domain::ReceiptSummary;

/// Block as parsed from raw JSON, tolerant of non-standard chains
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub base_fee_per_gas: Option<u64>,
    pub miner: String,
    /// Number of transactions, also when only hashes were requested
    pub transaction_count: u64,
    /// Full transactions, empty unless requested
    pub transactions: Vec<RawTransaction>,
}

/// Transaction as parsed from raw JSON; unknown types are kept, not rejected
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub value: U256,
    pub input: Bytes,
    pub gas: u64,
    pub gas_price: Option<U256>,
    pub nonce: u64,
    pub block_number: Option<u64>,
    pub tx_type: Option<u8>,
}

/// A log entry as returned by `eth_getLogs`
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
}

/// `eth_getLogs` filter for one event of one contract over an inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub topic0: B256,
    pub from_block: u64,
    pub to_block: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    fn to_param(self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Pending => "pending".to_string(),
            BlockTag::Number(number) => format!("0x{:x}", number),
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    /// HTTP JSON-RPC endpoint
    Http(String),
    /// WebSocket endpoint
    WebSocket(String),
}

impl ProviderConfig {
    /// Pick the transport from the URL scheme
    pub fn from_url(url: &str) -> Self {
        let url = url.trim().to_string();
        if url.starts_with("ws://") || url.starts_with("wss://") {
            ProviderConfig::WebSocket(url)
        } else {
            ProviderConfig::Http(url)
        }
    }

    pub fn display(&self) -> String {
        match self {
            ProviderConfig::Http(url) => url.clone(),
            ProviderConfig::WebSocket(url) => url.clone(),
        }
    }
}

/// Abstract chain client
///
/// Every chain read or write the explorer and relay perform goes through
/// this trait, so a network switch is just a different implementation.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    /// `include_txs` asks for full transaction objects instead of hashes
    async fn get_block(&self, tag: BlockTag, include_txs: bool) -> Result<Option<RawBlock>>;

    async fn get_transaction(&self, hash: B256) -> Result<Option<RawTransaction>>;

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>>;

    /// Get account balance in wei
    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Deployed bytecode, empty for externally owned accounts
    async fn get_code(&self, address: Address) -> Result<Bytes>;

    /// Current gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Pending nonce of an account
    async fn transaction_count(&self, address: Address) -> Result<u64>;

    /// Execute a call (eth_call) against the latest block
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256>;

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>>;

    /// Transactions in the pending block
    async fn pending_transaction_count(&self) -> Result<u64>;

    fn endpoint_name(&self) -> String;
}

/// Recommended-fillers provider; identical for both transports
type FilledProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
    Ethereum,
>;

/// Live node connection over HTTP or WebSocket
pub enum AlloyProvider {
    Http {
        provider: FilledProvider,
        endpoint: String,
    },
    WebSocket {
        provider: FilledProvider,
        endpoint: String,
    },
}

pub async fn create_provider(config: ProviderConfig) -> Result<AlloyProvider> {
    match config {
        ProviderConfig::Http(url) => {
            let rpc_url = url.parse().context("Invalid HTTP URL")?;
            let provider = ProviderBuilder::new().connect_http(rpc_url);
            Ok(AlloyProvider::Http {
                provider,
                endpoint: url,
            })
        }
        ProviderConfig::WebSocket(url) => {
            let provider = ProviderBuilder::new()
                .connect(&url)
                .await
                .context("Failed to create WebSocket provider")?;
            Ok(AlloyProvider::WebSocket {
                provider,
                endpoint: url,
            })
        }
    }
}

// Dispatch a typed provider call to whichever transport is live
macro_rules! impl_provider_method {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            AlloyProvider::Http { provider, .. } => provider.$method($($arg),*).await,
            AlloyProvider::WebSocket { provider, .. } => provider.$method($($arg),*).await,
        }
    };
}

// Same for raw JSON-RPC requests; the result type comes from the binding
macro_rules! raw_request {
    ($self:ident, $method:expr, $params:expr) => {
        match $self {
            AlloyProvider::Http { provider, .. } => {
                provider.raw_request($method.into(), $params).await
            }
            AlloyProvider::WebSocket { provider, .. } => {
                provider.raw_request($method.into(), $params).await
            }
        }
    };
}

#[async_trait::async_trait]
impl ChainClient for AlloyProvider {
    async fn chain_id(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_chain_id)?)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(impl_provider_method!(self, get_block_number)?)
    }

    async fn get_block(&self, tag: BlockTag, include_txs: bool) -> Result<Option<RawBlock>> {
        let param = tag.to_param();
        let json: serde_json::Value =
            raw_request!(self, "eth_getBlockByNumber", (&param, include_txs))
                .with_context(|| format!("eth_getBlockByNumber({})", param))?;

        if json.is_null() {
            return Ok(None);
        }

        Ok(Some(parse_raw_block(&json)?))
    }

    async fn get_transaction(&self, hash: B256) -> Result<Option<RawTransaction>> {
        let json: serde_json::Value = raw_request!(self, "eth_getTransactionByHash", (hash,))
            .context("eth_getTransactionByHash")?;

        if json.is_null() {
            return Ok(None);
        }

        parse_raw_transaction(&json)
            .map(Some)
            .context("malformed transaction in eth_getTransactionByHash response")
    }

    async fn get_receipt(&self, hash: B256) -> Result<Option<ReceiptSummary>> {
        let json: serde_json::Value = raw_request!(self, "eth_getTransactionReceipt", (hash,))
            .context("eth_getTransactionReceipt")?;

        if json.is_null() {
            return Ok(None);
        }

        Ok(Some(parse_receipt(&json, hash)?))
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(impl_provider_method!(self, get_balance, address)?)
    }

    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(impl_provider_method!(self, get_code_at, address)?)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(impl_provider_method!(self, get_gas_price)?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64> {
        let count: U64 = raw_request!(self, "eth_getTransactionCount", (address, "pending"))
            .context("eth_getTransactionCount")?;
        Ok(count.to::<u64>())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = TransactionRequest::default().to(to).input(data.into());
        Ok(impl_provider_method!(self, call, request.clone())?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256> {
        let pending = impl_provider_method!(self, send_raw_transaction, &raw)?;
        Ok(*pending.tx_hash())
    }

    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>> {
        let filter = Filter::new()
            .address(query.address)
            .event_signature(query.topic0)
            .from_block(query.from_block)
            .to_block(query.to_block);

        let logs = impl_provider_method!(self, get_logs, &filter)?;

        Ok(logs
            .into_iter()
            .map(|log| RawLog {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
                block_number: log.block_number,
                log_index: log.log_index,
                transaction_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn pending_transaction_count(&self) -> Result<u64> {
        let count: Option<U64> =
            raw_request!(self, "eth_getBlockTransactionCountByNumber", ("pending",))
                .context("eth_getBlockTransactionCountByNumber")?;
        Ok(count.map(|c| c.to::<u64>()).unwrap_or(0))
    }

    fn endpoint_name(&self) -> String {
        match self {
            AlloyProvider::Http { endpoint, .. } => endpoint.clone(),
            AlloyProvider::WebSocket { endpoint, .. } => endpoint.clone(),
        }
    }
}

/// Block from `eth_getBlockByNumber`; hash-only transaction lists are just counted
pub(crate) fn parse_raw_block(json: &serde_json::Value) -> Result<RawBlock> {
    let txs = json
        .get("transactions")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(RawBlock {
        number: hex_field(json, "number")?,
        hash: text_field(json, "hash", "0x0"),
        parent_hash: text_field(json, "parentHash", "0x0"),
        timestamp: hex_field(json, "timestamp")?,
        gas_used: hex_field(json, "gasUsed")?,
        gas_limit: hex_field(json, "gasLimit")?,
        base_fee_per_gas: json_str(json, "baseFeePerGas").and_then(|s| parse_hex_u64(s).ok()),
        miner: text_field(json, "miner", "0x0000000000000000000000000000000000000000"),
        transaction_count: txs.len() as u64,
        transactions: txs
            .iter()
            .filter(|tx| tx.is_object())
            .filter_map(parse_raw_transaction)
            .collect(),
    })
}

/// `None` when `hash` or `from` is missing; other fields default
pub(crate) fn parse_raw_transaction(json: &serde_json::Value) -> Option<RawTransaction> {
    let input = json_str(json, "input").unwrap_or("0x");

    Some(RawTransaction {
        hash: json_str(json, "hash")?.to_string(),
        from: json_str(json, "from")?.to_string(),
        to: json_str(json, "to").map(str::to_string),
        value: json_str(json, "value")
            .and_then(|s| parse_hex_u256(s).ok())
            .unwrap_or_default(),
        input: hex::decode(input.trim_start_matches("0x")).unwrap_or_default().into(),
        gas: hex_field(json, "gas").unwrap_or(0),
        gas_price: json_str(json, "gasPrice").and_then(|s| parse_hex_u256(s).ok()),
        nonce: hex_field(json, "nonce").unwrap_or(0),
        block_number: json_str(json, "blockNumber").and_then(|s| parse_hex_u64(s).ok()),
        tx_type: json_str(json, "type")
            .and_then(|s| parse_hex_u64(s).ok())
            .and_then(|n| u8::try_from(n).ok()),
    })
}

/// Receipts without `status` predate Byzantium and count as success
pub(crate) fn parse_receipt(json: &serde_json::Value, hash: B256) -> Result<ReceiptSummary> {
    let success = match json_str(json, "status") {
        Some(status) => parse_hex_u64(status)? == 1,
        None => true,
    };

    Ok(ReceiptSummary {
        transaction_hash: hash,
        block_number: json_str(json, "blockNumber").and_then(|s| parse_hex_u64(s).ok()),
        success,
        gas_used: hex_field(json, "gasUsed").unwrap_or(0),
    })
}

fn json_str<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    json.get(key).and_then(|v| v.as_str())
}

fn text_field(json: &serde_json::Value, key: &str, default: &str) -> String {
    json_str(json, key).unwrap_or(default).to_string()
}

/// Hex quantity under `key`; absent means zero
fn hex_field(json: &serde_json::Value, key: &str) -> Result<u64> {
    match json_str(json, key) {
        Some(s) => parse_hex_u64(s).with_context(|| format!("field {}", key)),
        None => Ok(0),
    }
}

pub(crate) fn parse_hex_u64(s: &str) -> Result<u64> {
    let digits = s.trim_start_matches("0x");
    u64::from_str_radix(digits, 16).with_context(|| format!("not a hex quantity: {}", s))
}

pub(crate) fn parse_hex_u256(s: &str) -> Result<U256> {
    match s.trim_start_matches("0x") {
        "" | "0" => Ok(U256::ZERO),
        digits => U256::from_str_radix(digits, 16).with_context(|| format!("not a hex quantity: {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_block_with_hashes_only() {
        let block = parse_raw_block(&json!({
            "number": "0x10",
            "hash": "0xaa",
            "parentHash": "0xbb",
            "timestamp": "0x64",
            "gasUsed": "0x5208",
            "gasLimit": "0x1c9c380",
            "transactions": ["0x01", "0x02", "0x03"]
        }))
        .unwrap();

        assert_eq!(block.number, 16);
        assert_eq!(block.timestamp, 100);
        assert_eq!(block.transaction_count, 3);
        assert!(block.transactions.is_empty());
        assert!(block.base_fee_per_gas.is_none());
    }

    #[test]
    fn test_parse_transaction() {
        let tx = parse_raw_transaction(&json!({
            "hash": "0x01",
            "from": "0x1111111111111111111111111111111111111111",
            "to": null,
            "value": "0xde0b6b3a7640000",
            "input": "0x6080",
            "gas": "0x5208",
            "gasPrice": "0x3b9aca00",
            "nonce": "0x2",
            "blockNumber": "0x10",
            "type": "0x0"
        }))
        .unwrap();

        assert!(tx.to.is_none());
        assert_eq!(tx.value, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.gas_price, Some(U256::from(1_000_000_000u64)));
        assert_eq!(tx.block_number, Some(16));

        assert!(parse_raw_transaction(&json!({"hash": "0x01"})).is_none());
    }

    #[test]
    fn test_parse_receipt_status() {
        let ok = parse_receipt(&json!({"status": "0x1", "blockNumber": "0x5", "gasUsed": "0x5208"}), B256::ZERO).unwrap();
        assert!(ok.success);
        assert_eq!(ok.block_number, Some(5));
        assert_eq!(ok.gas_used, 21_000);

        let failed = parse_receipt(&json!({"status": "0x0"}), B256::ZERO).unwrap();
        assert!(!failed.success);

        let legacy = parse_receipt(&json!({"root": "0xabc"}), B256::ZERO).unwrap();
        assert!(legacy.success);
    }

    #[test]
    fn test_provider_config_from_url() {
        assert!(matches!(ProviderConfig::from_url("wss://node"), ProviderConfig::WebSocket(_)));
        assert!(matches!(ProviderConfig::from_url("https://node"), ProviderConfig::Http(_)));
    }
}
