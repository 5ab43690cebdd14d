//! Address (EIP-55) and hash format checks

use alloy_primitives::{keccak256, Address, B256};

use crate::core::{Error, Result};

/// Parse a user-supplied address, enforcing EIP-55 when the input is mixed case
pub fn parse_address(input: &str) -> Result<Address> {
    let trimmed = input.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if payload.len() != 40 || !payload.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidInput(format!(
            "invalid address (expected 40 hex chars): {}",
            input
        )));
    }

    let has_upper = payload.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = payload.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower {
        let expected = to_checksum_address(&payload.to_lowercase());
        if expected[2..] != *payload {
            return Err(Error::InvalidInput(format!(
                "address checksum mismatch: {} (expected {})",
                input, expected
            )));
        }
    }

    let bytes = hex::decode(payload)
        .map_err(|err| Error::InvalidInput(format!("invalid address {}: {}", input, err)))?;
    Ok(Address::from_slice(&bytes))
}

pub fn is_valid_address(input: &str) -> bool {
    parse_address(input).is_ok()
}

/// Parse a transaction hash: `0x` followed by 64 hex chars
pub fn parse_tx_hash(input: &str) -> Result<B256> {
    let trimmed = input.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidInput(format!("hash must start with 0x: {}", input)))?;

    if payload.len() != 64 || !payload.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidInput(format!(
            "invalid transaction hash (expected 0x + 64 hex chars): {}",
            input
        )));
    }

    let bytes = hex::decode(payload)
        .map_err(|err| Error::InvalidInput(format!("invalid hash {}: {}", input, err)))?;
    Ok(B256::from_slice(&bytes))
}

/// EIP-55 checksum of a lowercase 40-char hex address (no prefix)
pub fn to_checksum_address(addr: &str) -> String {
    let hash = keccak256(addr.as_bytes());
    let hash_hex = hex::encode(hash.as_slice());

    let mut result = String::with_capacity(42);
    result.push_str("0x");

    for (c, hash_char) in addr.chars().zip(hash_hex.chars()) {
        let hash_val = hash_char.to_digit(16).unwrap_or(0);

        if hash_val >= 8 {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c);
        }
    }

    result
}
