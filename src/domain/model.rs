//! Explorer and relay entities
//!
//! Every monetary field holds an already-normalised decimal string; raw
//! base-unit integers never reach these types.

use std::collections::BTreeMap;
use std::fmt;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;

use super::abi::{EventSignature, FunctionSignature};

#[derive(Debug, Clone, Serialize)]
pub struct BlockRef {
    pub number: u64,
    pub hash: String,
    pub timestamp: u64,
    pub transaction_count: u64,
}

/// Coarse classification of a transaction by its input payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MethodLabel {
    Transfer,
    #[serde(rename = "Contract Interaction")]
    ContractInteraction,
}

impl MethodLabel {
    /// Empty input (`""` or `"0x"`) is a plain value transfer
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "0x" || trimmed == "0X" {
            MethodLabel::Transfer
        } else {
            MethodLabel::ContractInteraction
        }
    }
}

impl fmt::Display for MethodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodLabel::Transfer => write!(f, "Transfer"),
            MethodLabel::ContractInteraction => write!(f, "Contract Interaction"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    /// Native currency, decimal
    pub value: String,
    pub gas: u64,
    /// Gwei, decimal
    pub gas_price: String,
    pub nonce: u64,
    pub block_number: u64,
    pub timestamp: u64,
    pub method_label: MethodLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Every field decoded
    Success,
    /// Decoded, but some indexed dynamic fields are only their topic hash
    Info,
    /// Decoding failed; `return_values` holds raw topics and data
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: String,
    pub event_name: String,
    pub return_values: BTreeMap<String, String>,
    pub status: EventStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenBalance {
    pub symbol: String,
    pub token_address: String,
    pub balance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressSnapshot {
    pub address: String,
    pub native_balance: String,
    pub is_contract: bool,
    pub code: Option<String>,
    pub token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DescriptorError {
    /// No code deployed at the address
    NotAContract,
    /// Code exists but no ABI could be obtained
    AbiUnavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractDescriptor {
    pub address: String,
    pub bytecode: String,
    pub abi: Option<JsonAbi>,
    pub contract_name: Option<String>,
    pub functions: Vec<FunctionSignature>,
    pub events: Vec<EventSignature>,
    pub is_verified: bool,
    pub is_proxy: bool,
    pub implementation_address: Option<String>,
    pub error: Option<DescriptorError>,
}

impl ContractDescriptor {
    /// Descriptor for an address without code
    pub fn not_a_contract(address: Address) -> Self {
        Self {
            address: address.to_checksum(None),
            bytecode: "0x".to_string(),
            abi: None,
            contract_name: None,
            functions: Vec::new(),
            events: Vec::new(),
            is_verified: false,
            is_proxy: false,
            implementation_address: None,
            error: Some(DescriptorError::NotAContract),
        }
    }
}

/// Authorization data for an EIP-2612 permit
///
/// Not `Clone`: a request is signed at most once.
#[derive(Debug, Serialize)]
pub struct PermitRequest {
    pub token_contract: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: u64,
    pub chain_id: u64,
    pub domain_name: String,
    pub domain_version: String,
}

/// Split 65-byte secp256k1 signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PermitSignature {
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
    pub gas_used: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub gas_price_gwei: String,
    /// Latest block timestamp minus its parent's
    pub block_time_secs: u64,
    pub latest_block: u64,
    pub pending_transactions: u64,
}
