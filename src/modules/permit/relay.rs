//! Fee-payer side: legacy transaction signing, broadcast and receipt polling

use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;

use super::wallet::parse_signer;
use crate::core::{ChainHandle, Error, Result, RpcResultExt};
use crate::domain::ReceiptSummary;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub gas_limit: u64,
    /// Permit validity from the moment the data is gathered
    pub deadline_secs: u64,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            gas_limit: 200_000,
            deadline_secs: 600,
            receipt_poll_interval: Duration::from_secs(2),
            receipt_timeout: Duration::from_secs(120),
        }
    }
}

/// Account that pays gas for both relayed transactions
pub struct FeePayer {
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for FeePayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeePayer")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl FeePayer {
    pub fn from_key(key: &str) -> Result<Self> {
        Ok(Self {
            signer: parse_signer(key)?,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// EIP-155 legacy transaction calling `to` with `input`, no value
    pub fn sign_legacy(
        &self,
        chain_id: u64,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        to: Address,
        input: Bytes,
    ) -> Result<Bytes> {
        let mut tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value: U256::ZERO,
            input,
        };
        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|err| Error::InvalidInput(format!("failed to sign transaction: {}", err)))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(envelope.encoded_2718().into())
    }
}

/// Sign, broadcast and wait; a failed receipt is a `Revert`
pub async fn submit(
    handle: &ChainHandle,
    fee_payer: &FeePayer,
    to: Address,
    input: Bytes,
    settings: &RelaySettings,
) -> Result<ReceiptSummary> {
    let chain_id = handle.node_chain_id().await?;
    let nonce = handle
        .client
        .transaction_count(fee_payer.address())
        .await
        .map_rpc()?;
    let gas_price = handle.client.gas_price().await.map_rpc()?;

    let raw = fee_payer.sign_legacy(chain_id, nonce, gas_price, settings.gas_limit, to, input)?;
    let hash = handle.client.send_raw_transaction(raw).await.map_rpc()?;
    tracing::info!(tx = %hash, nonce, gas_price, "transaction broadcast");

    let receipt = wait_for_receipt(handle, hash, settings).await?;
    if !receipt.success {
        return Err(Error::Revert(format!("transaction {:#x} reverted", hash)));
    }
    Ok(receipt)
}

pub async fn wait_for_receipt(
    handle: &ChainHandle,
    hash: B256,
    settings: &RelaySettings,
) -> Result<ReceiptSummary> {
    let started = tokio::time::Instant::now();
    loop {
        if let Some(receipt) = handle.client.get_receipt(hash).await.map_rpc()? {
            tracing::debug!(tx = %hash, block = ?receipt.block_number, success = receipt.success, "receipt received");
            return Ok(receipt);
        }
        if started.elapsed() >= settings.receipt_timeout {
            return Err(Error::Network(format!(
                "timed out after {:?} waiting for receipt of {:#x}",
                settings.receipt_timeout, hash
            )));
        }
        tokio::time::sleep(settings.receipt_poll_interval).await;
    }
}
