//! Value normalizer: base-unit integers to decimal strings, display sanitation
//!
//! Anything coming from RPC or the indexer passes through here before it is
//! stored in an entity. Integers leave this module as strings only, so 256-bit
//! values survive serialization without precision loss.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::U256;
use serde_json::Value;

use crate::core::{Error, Result};

pub const ETHER_DECIMALS: u8 = 18;
pub const GWEI_DECIMALS: u8 = 9;

/// Parse a base-unit integer given as `0x` hex or decimal
pub fn parse_base_units(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return None;
        }
        return U256::from_str_radix(hex, 16).ok();
    }
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(raw, 10).ok()
}

/// Base units (18 decimals) to a decimal string, `"0"` on empty or malformed input
pub fn wei_to_decimal(raw: &str) -> String {
    normalize(raw, ETHER_DECIMALS)
}

/// Wei to gwei (9 decimals), `"0"` on empty or malformed input
pub fn wei_to_gwei(raw: &str) -> String {
    normalize(raw, GWEI_DECIMALS)
}

/// Base units with arbitrary decimals; malformed input is passed through unchanged
pub fn format_base_units(raw: &str, decimals: u8) -> String {
    match parse_base_units(raw) {
        Some(value) => format_units(value, decimals),
        None => raw.to_string(),
    }
}

fn normalize(raw: &str, decimals: u8) -> String {
    match parse_base_units(raw) {
        Some(value) => format_units(value, decimals),
        None => {
            if !raw.trim().is_empty() {
                tracing::warn!(value = raw, "malformed base-unit value, using 0");
            }
            "0".to_string()
        }
    }
}

/// Format an integer amount with `decimals` fractional digits, trailing zeros trimmed
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let unit = U256::from(10u64).pow(U256::from(decimals));
    let integer = value / unit;
    let remainder = value % unit;
    if remainder.is_zero() {
        return integer.to_string();
    }
    let fraction = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
    format!("{}.{}", integer, fraction.trim_end_matches('0'))
}

/// Parse a human decimal amount ("1.5") into base units
pub fn parse_units(input: &str, decimals: u8) -> Result<U256> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidInput("amount is empty".to_string()));
    }

    let (integer_part, decimal_part) = match input.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (input, ""),
    };

    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !is_digits(integer_part) || !is_digits(decimal_part) || (integer_part.is_empty() && decimal_part.is_empty()) {
        return Err(Error::InvalidInput(format!("invalid amount: {}", input)));
    }
    if decimal_part.len() > decimals as usize {
        return Err(Error::InvalidInput(format!(
            "too many decimal places (max {}): {}",
            decimals, input
        )));
    }

    let overflow = || Error::InvalidInput(format!("amount overflows 256 bits: {}", input));
    let unit = U256::from(10u64).pow(U256::from(decimals));

    let integer = if integer_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(integer_part, 10).map_err(|_| overflow())?
    };

    let fraction = if decimal_part.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", decimal_part, width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    integer
        .checked_mul(unit)
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(overflow)
}

/// Convert a decoded ABI value into JSON with every integer as a decimal string
pub fn sanitize_for_display(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            let bytes = &word.as_slice()[..(*size).min(32)];
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        DynSolValue::Address(addr) => Value::String(addr.to_checksum(None)),
        DynSolValue::Function(func) => Value::String(format!("0x{}", hex::encode(func.as_slice()))),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(sanitize_for_display).collect())
        }
        #[allow(unreachable_patterns)]
        other => match other.as_fixed_seq() {
            Some(items) => Value::Array(items.iter().map(sanitize_for_display).collect()),
            None => Value::String(format!("{:?}", other)),
        },
    }
}

/// Flat display string for a decoded value (scalars plain, composites as JSON)
pub fn display_value(value: &DynSolValue) -> String {
    match sanitize_for_display(value) {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Recursively replace every JSON integer with its decimal string
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, sanitize_json(value)))
                .collect(),
        ),
        other => other,
    }
}
