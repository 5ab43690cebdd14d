//! Decoded event logs

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use super::EventSignature;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedArg {
    /// Parameter name (or "arg{n}" if unnamed)
    pub name: String,
    /// Solidity type (e.g., "address", "uint256", "(uint256,address)")
    pub kind: String,
    /// Decoded value as a display string (integers in decimal)
    pub value: String,
    /// Indexed dynamic value: only its keccak hash is on chain
    pub hashed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedLog {
    pub event_name: String,
    pub signature: String,
    pub arguments: Vec<DecodedArg>,
}

impl DecodedLog {
    /// True when every argument was recovered in full
    pub fn is_complete(&self) -> bool {
        self.arguments.iter().all(|arg| !arg.hashed)
    }
}

pub trait LogDecoder: Send + Sync {
    /// `topics` includes topic0 for non-anonymous events
    fn decode_log(
        &self,
        event: &EventSignature,
        topics: &[B256],
        data: &[u8],
    ) -> anyhow::Result<DecodedLog>;
}
