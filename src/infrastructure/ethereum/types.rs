//! Type conversions between raw RPC types and domain entities
//!
//! Monetary values are normalised here, at the boundary.

use crate::domain::{BlockRef, MethodLabel, TransactionRecord};
use crate::infrastructure::ethereum::{RawBlock, RawTransaction};
use crate::modules::toolkit::convert::{format_units, ETHER_DECIMALS, GWEI_DECIMALS};

pub fn to_block_ref(block: &RawBlock) -> BlockRef {
    BlockRef {
        number: block.number,
        hash: block.hash.clone(),
        timestamp: block.timestamp,
        transaction_count: block.transaction_count,
    }
}

/// Map an RPC transaction; `timestamp` comes from the containing block (0 if unknown)
pub fn to_transaction_record(tx: &RawTransaction, timestamp: u64) -> TransactionRecord {
    let input = format!("0x{}", hex::encode(&tx.input));
    TransactionRecord {
        hash: tx.hash.clone(),
        from: tx.from.clone(),
        to: tx.to.clone(),
        value: format_units(tx.value, ETHER_DECIMALS),
        gas: tx.gas,
        gas_price: tx
            .gas_price
            .map(|price| format_units(price, GWEI_DECIMALS))
            .unwrap_or_else(|| "0".to_string()),
        nonce: tx.nonce,
        block_number: tx.block_number.unwrap_or(0),
        timestamp,
        method_label: MethodLabel::from_input(&input),
    }
}

/// True when the transaction was sent from or to `address` (case-insensitive)
pub fn touches(tx: &RawTransaction, address: &str) -> bool {
    tx.from.eq_ignore_ascii_case(address)
        || tx
            .to
            .as_deref()
            .is_some_and(|to| to.eq_ignore_ascii_case(address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, U256};

    fn raw_tx(input: Vec<u8>) -> RawTransaction {
        RawTransaction {
            hash: "0x01".to_string(),
            from: "0xAbC0000000000000000000000000000000000001".to_string(),
            to: Some("0x0000000000000000000000000000000000000002".to_string()),
            value: U256::from(2_500_000_000_000_000_000u128),
            input: Bytes::from(input),
            gas: 21_000,
            gas_price: Some(U256::from(30_000_000_000u64)),
            nonce: 7,
            block_number: Some(42),
            tx_type: Some(0),
        }
    }

    #[test]
    fn test_transaction_record_is_normalised() {
        let record = to_transaction_record(&raw_tx(vec![]), 1_700_000_000);
        assert_eq!(record.value, "2.5");
        assert_eq!(record.gas_price, "30");
        assert_eq!(record.block_number, 42);
        assert_eq!(record.method_label, MethodLabel::Transfer);

        let call = to_transaction_record(&raw_tx(vec![0xa9, 0x05, 0x9c, 0xbb]), 0);
        assert_eq!(call.method_label, MethodLabel::ContractInteraction);
    }

    #[test]
    fn test_touches() {
        let tx = raw_tx(vec![]);
        assert!(touches(&tx, "0xabc0000000000000000000000000000000000001"));
        assert!(touches(&tx, "0x0000000000000000000000000000000000000002"));
        assert!(!touches(&tx, "0x0000000000000000000000000000000000000003"));
    }
}
