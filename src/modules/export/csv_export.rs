//! CSV Export
//!
//! Writes event records, transactions and relay journal entries.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;

use crate::domain::{EventRecord, EventStatus, TransactionRecord};
use crate::store::RelayAttempt;

/// Write event records; decoded fields become columns after the fixed ones
pub fn write_events<W: Write>(writer: W, records: &[EventRecord]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    let fields: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.return_values.keys().map(String::as_str))
        .collect();

    let mut header = vec!["block_number", "log_index", "transaction_hash", "event", "status"];
    header.extend(fields.iter().copied());
    wtr.write_record(&header)?;

    for record in records {
        let status = match record.status {
            EventStatus::Success => "success",
            EventStatus::Info => "info",
            EventStatus::Error => "error",
        };
        let mut row = vec![
            record.block_number.to_string(),
            record.log_index.to_string(),
            record.transaction_hash.clone(),
            record.event_name.clone(),
            status.to_string(),
        ];
        row.extend(
            fields
                .iter()
                .map(|field| record.return_values.get(*field).cloned().unwrap_or_default()),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(records.len())
}

pub fn write_transactions<W: Write>(writer: W, txs: &[TransactionRecord]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "hash",
        "block_number",
        "timestamp",
        "from",
        "to",
        "value",
        "gas",
        "gas_price_gwei",
        "nonce",
        "method",
    ])?;

    for tx in txs {
        wtr.write_record([
            tx.hash.clone(),
            tx.block_number.to_string(),
            tx.timestamp.to_string(),
            tx.from.clone(),
            tx.to.clone().unwrap_or_default(),
            tx.value.clone(),
            tx.gas.to_string(),
            tx.gas_price.clone(),
            tx.nonce.to_string(),
            tx.method_label.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(txs.len())
}

pub fn write_relay_attempts<W: Write>(writer: W, attempts: &[RelayAttempt]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "id", "status", "chain_id", "token", "owner", "recipient", "value", "nonce", "permit_tx",
        "transfer_tx", "error", "updated_at",
    ])?;

    for attempt in attempts {
        wtr.write_record([
            attempt.id.to_string(),
            attempt.status.to_string(),
            attempt.chain_id.to_string(),
            attempt.token.clone(),
            attempt.owner.clone(),
            attempt.recipient.clone(),
            attempt.value.clone(),
            attempt.nonce.clone(),
            attempt.permit_tx.clone().unwrap_or_default(),
            attempt.transfer_tx.clone().unwrap_or_default(),
            attempt.error.clone().unwrap_or_default(),
            attempt.updated_at.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(attempts.len())
}
