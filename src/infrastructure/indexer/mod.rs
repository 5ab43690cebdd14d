//! Indexer infrastructure - verification and transaction-history API
//!
//! The indexing service returns loosely typed JSON (numbers as decimal
//! strings). It is decoded into `IndexedTransaction` here and mapped into
//! domain records before anything else sees it.

mod etherscan;

use alloy::primitives::{Address, B256};
use anyhow::Result;
use serde::Deserialize;

use crate::domain::{MethodLabel, TransactionRecord};
use crate::infrastructure::ethereum::RawTransaction;
use crate::modules::toolkit::convert::{wei_to_decimal, wei_to_gwei};

pub use etherscan::EtherscanClient;

/// One entry of an account's transaction list, as the indexer returns it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTransaction {
    #[serde(default)]
    pub block_number: String,
    #[serde(default)]
    pub time_stamp: String,
    pub hash: String,
    #[serde(default)]
    pub nonce: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub gas: String,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub is_error: String,
}

/// Verified-source metadata of a contract
#[derive(Debug, Clone, Default)]
pub struct ContractSource {
    pub contract_name: Option<String>,
    /// ABI JSON text, absent when the source is not verified
    pub abi: Option<String>,
    pub is_proxy: bool,
    pub implementation: Option<Address>,
}

/// Etherscan-compatible indexing API
#[async_trait::async_trait]
pub trait IndexerClient: Send + Sync + 'static {
    /// ABI JSON text for a verified contract
    async fn contract_abi(&self, address: Address) -> Result<Option<String>>;

    /// Source entry for a verified contract
    async fn contract_source(&self, address: Address) -> Result<Option<ContractSource>>;

    /// Newest-first transaction list, `page` is 1-based
    async fn transactions(
        &self,
        address: Address,
        page: u32,
        offset: usize,
    ) -> Result<Vec<IndexedTransaction>>;

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<RawTransaction>>;

    fn name(&self) -> String;
}

/// Map an indexer entry into a normalised record
pub fn to_transaction_record(tx: &IndexedTransaction) -> TransactionRecord {
    TransactionRecord {
        hash: tx.hash.clone(),
        from: tx.from.clone(),
        to: Some(tx.to.clone()).filter(|to| !to.is_empty()),
        value: wei_to_decimal(&tx.value),
        gas: parse_decimal_u64(&tx.gas, "gas"),
        gas_price: wei_to_gwei(&tx.gas_price),
        nonce: parse_decimal_u64(&tx.nonce, "nonce"),
        block_number: parse_decimal_u64(&tx.block_number, "blockNumber"),
        timestamp: parse_decimal_u64(&tx.time_stamp, "timeStamp"),
        method_label: MethodLabel::from_input(&tx.input),
    }
}

fn parse_decimal_u64(raw: &str, field: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(field, value = raw, "malformed indexer field, using 0");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_transaction_mapping() {
        let tx: IndexedTransaction = serde_json::from_value(serde_json::json!({
            "blockNumber": "18000000",
            "timeStamp": "1693000000",
            "hash": "0xabc",
            "nonce": "12",
            "blockHash": "0xdef",
            "from": "0x1111111111111111111111111111111111111111",
            "to": "",
            "value": "1500000000000000000",
            "gas": "21000",
            "gasPrice": "25000000000",
            "isError": "0",
            "input": "0x",
            "confirmations": "100"
        }))
        .unwrap();

        let record = to_transaction_record(&tx);
        assert_eq!(record.block_number, 18_000_000);
        assert_eq!(record.timestamp, 1_693_000_000);
        assert_eq!(record.value, "1.5");
        assert_eq!(record.gas_price, "25");
        assert_eq!(record.nonce, 12);
        assert!(record.to.is_none());
        assert_eq!(record.method_label, MethodLabel::Transfer);
    }

    #[test]
    fn test_malformed_fields_degrade_to_zero() {
        let tx = IndexedTransaction {
            hash: "0x1".to_string(),
            from: "0x2".to_string(),
            block_number: "abc".to_string(),
            value: "".to_string(),
            input: "0xa9059cbb".to_string(),
            ..Default::default()
        };
        let record = to_transaction_record(&tx);
        assert_eq!(record.block_number, 0);
        assert_eq!(record.value, "0");
        assert_eq!(record.method_label, MethodLabel::ContractInteraction);
    }
}
