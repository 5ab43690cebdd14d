//! Live-node checks for block and transaction lookups
//!
//! Needs a node at `RPC_URL` (default: local anvil). Run with
//! `cargo test -- --ignored`.

use chainlens::config::NetworkConfig;
use chainlens::core::ChainHandle;
use chainlens::modules::{explorer, stats};

fn live_network() -> NetworkConfig {
    NetworkConfig {
        name: "live".to_string(),
        rpc: std::env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
        chain_id: None,
        symbol: "ETH".to_string(),
        explorer_url: None,
        indexer_url: None,
        indexer_key_env: None,
    }
}

#[tokio::test]
#[ignore = "needs a running node"]
async fn test_latest_block_and_transactions() {
    let handle = ChainHandle::connect(live_network(), None).await.expect("connect");

    let latest = explorer::latest_block_number(&handle).await.expect("block number");
    let details = explorer::block(&handle, latest).await.expect("latest block");
    assert_eq!(details.block.number, latest);
    assert_eq!(details.block.transaction_count as usize, details.transactions.len());

    for tx in &details.transactions {
        assert_eq!(tx.block_number, latest);
        let fetched = explorer::transaction(&handle, &tx.hash).await.expect("transaction");
        assert_eq!(fetched.hash, tx.hash);
        assert_eq!(fetched.timestamp, details.block.timestamp);
    }
}

#[tokio::test]
#[ignore = "needs a running node"]
async fn test_network_stats() {
    let handle = ChainHandle::connect(live_network(), None).await.expect("connect");
    let stats = stats::network_stats(&handle).await.expect("stats");
    assert!(!stats.gas_price_gwei.is_empty());
}
