//! Network stats and the background monitor that refreshes them

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::{ChainHandle, Error, Result, RpcResultExt};
use crate::domain::NetworkStats;
use crate::infrastructure::ethereum::BlockTag;
use crate::modules::toolkit::convert::{format_units, GWEI_DECIMALS};
use alloy::primitives::U256;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Gas price, latest block, its block time and the pending count
pub async fn network_stats(handle: &ChainHandle) -> Result<NetworkStats> {
    let client = handle.client.as_ref();

    let gas_price = client.gas_price().await.map_rpc()?;
    let latest = client
        .get_block(BlockTag::Latest, false)
        .await
        .map_rpc()?
        .ok_or_else(|| Error::NotFound("latest block".to_string()))?;

    let block_time_secs = if latest.number == 0 {
        0
    } else {
        match client.get_block(BlockTag::Number(latest.number - 1), false).await.map_rpc()? {
            Some(parent) => latest.timestamp.saturating_sub(parent.timestamp),
            None => 0,
        }
    };

    let pending_transactions = client.pending_transaction_count().await.map_rpc()?;

    Ok(NetworkStats {
        gas_price_gwei: format_units(U256::from(gas_price), GWEI_DECIMALS),
        block_time_secs,
        latest_block: latest.number,
        pending_transactions,
    })
}

/// Periodic refresh of `NetworkStats` for one network
///
/// The task holds its own handle; switching networks means dropping this
/// monitor and spawning a new one.
pub struct StatsMonitor {
    receiver: watch::Receiver<Option<NetworkStats>>,
    task: JoinHandle<()>,
}

impl StatsMonitor {
    pub fn spawn(handle: Arc<ChainHandle>, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match network_stats(&handle).await {
                    Ok(stats) => {
                        tracing::debug!(block = stats.latest_block, gas = %stats.gas_price_gwei, "stats refreshed");
                        if sender.send(Some(stats)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(network = %handle.name(), error = %err, "stats refresh failed");
                    }
                }
            }
        });

        Self { receiver, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NetworkStats>> {
        self.receiver.clone()
    }

    /// Most recent successful refresh
    pub fn latest(&self) -> Option<NetworkStats> {
        self.receiver.borrow().clone()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for StatsMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
