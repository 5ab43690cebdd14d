//! Explorer lookups: blocks, transactions, receipts and address snapshots

use alloy::primitives::Address;
use serde::Serialize;

use crate::config::TokenSpec;
use crate::core::{ChainHandle, Error, Result, RpcResultExt};
use crate::domain::{AddressSnapshot, BlockRef, ReceiptSummary, TokenBalance, TransactionRecord};
use crate::infrastructure::ethereum::types::{to_block_ref, to_transaction_record, touches};
use crate::infrastructure::ethereum::{erc20, BlockTag, RawTransaction};
use crate::modules::toolkit::convert::{format_units, ETHER_DECIMALS};
use crate::modules::toolkit::{parse_address, parse_tx_hash};

pub const DEFAULT_SCAN_DEPTH: u64 = 10;
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct BlockDetails {
    pub block: BlockRef,
    pub transactions: Vec<TransactionRecord>,
}

pub async fn latest_block_number(handle: &ChainHandle) -> Result<u64> {
    handle.client.block_number().await.map_rpc()
}

pub async fn block(handle: &ChainHandle, number: u64) -> Result<BlockDetails> {
    let raw = handle
        .client
        .get_block(BlockTag::Number(number), true)
        .await
        .map_rpc()?
        .ok_or_else(|| Error::NotFound(format!("block {}", number)))?;

    let transactions = raw
        .transactions
        .iter()
        .map(|tx| to_transaction_record(tx, raw.timestamp))
        .collect();

    Ok(BlockDetails {
        block: to_block_ref(&raw),
        transactions,
    })
}

/// Look a transaction up on the node, falling back to the indexer
pub async fn transaction(handle: &ChainHandle, hash: &str) -> Result<TransactionRecord> {
    let hash = parse_tx_hash(hash)?;

    let from_node = match handle.client.get_transaction(hash).await {
        Ok(tx) => tx,
        Err(err) if handle.indexer.is_some() => {
            tracing::warn!(tx = %hash, error = %format!("{:#}", err), "node lookup failed, trying indexer");
            None
        }
        Err(err) => return Err(Error::from_rpc(err)),
    };

    let raw = match from_node {
        Some(tx) => tx,
        None => match handle.indexer.as_deref() {
            Some(indexer) => indexer
                .transaction_by_hash(hash)
                .await
                .map_rpc()?
                .ok_or_else(|| Error::NotFound(format!("transaction {:#x}", hash)))?,
            None => return Err(Error::NotFound(format!("transaction {:#x}", hash))),
        },
    };

    let timestamp = block_timestamp(handle, &raw).await;
    Ok(to_transaction_record(&raw, timestamp))
}

pub async fn receipt(handle: &ChainHandle, hash: &str) -> Result<ReceiptSummary> {
    let hash = parse_tx_hash(hash)?;
    handle
        .client
        .get_receipt(hash)
        .await
        .map_rpc()?
        .ok_or_else(|| Error::NotFound(format!("receipt for {:#x}", hash)))
}

/// Timestamp of the block containing `tx`; 0 when pending or unavailable
async fn block_timestamp(handle: &ChainHandle, tx: &RawTransaction) -> u64 {
    let Some(number) = tx.block_number else {
        return 0;
    };
    match handle.client.get_block(BlockTag::Number(number), false).await {
        Ok(Some(block)) => block.timestamp,
        Ok(None) => 0,
        Err(err) => {
            tracing::warn!(block = number, error = %format!("{:#}", err), "block timestamp unavailable");
            0
        }
    }
}

/// Native balance, code and watched token balances of an address
#[tracing::instrument(skip(handle, tokens), fields(network = %handle.name()))]
pub async fn snapshot(handle: &ChainHandle, address: &str, tokens: &[TokenSpec]) -> Result<AddressSnapshot> {
    let address = parse_address(address)?;
    let client = handle.client.as_ref();

    let balance = client.get_balance(address).await.map_rpc()?;
    let code = client.get_code(address).await.map_rpc()?;

    let mut token_balances = Vec::new();
    for token in tokens {
        match token_balance(handle, token, address).await {
            Ok(entry) => token_balances.push(entry),
            Err(err) => {
                tracing::warn!(token = %token.address, error = %err, "token balance unavailable, skipping")
            }
        }
    }

    Ok(AddressSnapshot {
        address: address.to_checksum(None),
        native_balance: format_units(balance, ETHER_DECIMALS),
        is_contract: !code.is_empty(),
        code: (!code.is_empty()).then(|| format!("0x{}", hex::encode(&code))),
        token_balances,
    })
}

async fn token_balance(handle: &ChainHandle, token: &TokenSpec, owner: Address) -> Result<TokenBalance> {
    let client = handle.client.as_ref();
    let token_address = parse_address(&token.address)?;

    let raw = erc20::balance_of(client, token_address, owner).await.map_rpc()?;
    let decimals = match token.decimals {
        Some(decimals) => decimals,
        None => erc20::decimals(client, token_address).await.map_rpc()?,
    };
    let symbol = match token.symbol.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(symbol) => symbol.to_string(),
        None => erc20::symbol(client, token_address)
            .await
            .unwrap_or_else(|_| token.display_symbol()),
    };

    Ok(TokenBalance {
        symbol,
        token_address: token_address.to_checksum(None),
        balance: format_units(raw, decimals),
    })
}

/// Walk the latest `depth` blocks for transactions touching `address`
///
/// Used when no indexer is configured. Blocks that fail to load are skipped.
#[tracing::instrument(skip(handle), fields(network = %handle.name()))]
pub async fn recent_transactions(
    handle: &ChainHandle,
    address: &str,
    depth: u64,
    limit: usize,
) -> Result<Vec<TransactionRecord>> {
    let address = parse_address(address)?;
    let wanted = format!("{:#x}", address);

    let latest = latest_block_number(handle).await?;
    let oldest = latest.saturating_sub(depth.saturating_sub(1));

    let mut records = Vec::new();
    for number in (oldest..=latest).rev() {
        let block = match handle.client.get_block(BlockTag::Number(number), true).await {
            Ok(Some(block)) => block,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(block = number, error = %format!("{:#}", err), "block unavailable, skipping");
                continue;
            }
        };
        tracing::debug!(block = number, txs = block.transactions.len(), "scanning block");

        for tx in block.transactions.iter().filter(|tx| touches(tx, &wanted)) {
            records.push(to_transaction_record(tx, block.timestamp));
            if records.len() >= limit {
                return Ok(records);
            }
        }
    }
    Ok(records)
}
