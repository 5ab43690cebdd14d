//! Range scanner against an in-memory chain
//!
//! Covers window planning, the result cap, field filtering, ordering and
//! recovery from failing windows.

mod common;

use std::time::Duration;

use alloy::primitives::Address;
use chainlens::core::Error;
use chainlens::domain::abi::AbiRegistry;
use chainlens::domain::EventStatus;
use chainlens::modules::scanner::{FieldFilter, RangeScanner, ScanSettings};

use common::{ether, transfer_log, FakeChain};

const TOKEN: Address = Address::new([0x77; 20]);
const ALICE: Address = Address::new([0xa1; 20]);
const BOB: Address = Address::new([0xb0; 20]);

fn settings(window_size: u64) -> ScanSettings {
    ScanSettings {
        window_size,
        max_window: 10_000,
        window_delay: Duration::ZERO,
        token_decimals: 18,
    }
}

#[tokio::test]
async fn test_cap_within_single_window() {
    let chain = FakeChain::new();
    for i in 0..8u64 {
        chain.add_log(transfer_log(TOKEN, 1_000_000 + i * 5, 0, ALICE, BOB, ether(i + 1)));
    }
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();

    let records = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(settings(1_000))
        .scan("Transfer", 1_000_000, 1_000_050, 5, None)
        .await
        .unwrap();

    assert_eq!(records.len(), 5);
    let blocks: Vec<u64> = records.iter().map(|r| r.block_number).collect();
    assert_eq!(blocks, vec![1_000_000, 1_000_005, 1_000_010, 1_000_015, 1_000_020]);

    let queries = chain.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].from_block, 1_000_000);
    assert_eq!(queries[0].to_block, 1_000_050);

    let first = &records[0];
    assert_eq!(first.status, EventStatus::Success);
    assert_eq!(first.return_values["value"], "1");
    assert!(first.return_values["from"].eq_ignore_ascii_case(&format!("{:#x}", ALICE)));
}

#[tokio::test]
async fn test_windows_never_pass_to_block() {
    let chain = FakeChain::new();
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();

    let report = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(settings(10))
        .scan_with_report("Transfer", 0, 45, 100, None)
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.windows_queried, 5);

    let queries = chain.queries();
    assert!(queries.iter().all(|q| q.to_block <= 45 && q.from_block <= q.to_block));
    assert_eq!(queries.last().unwrap().from_block, 40);
    assert_eq!(queries.last().unwrap().to_block, 45);
    // ascending and contiguous
    for pair in queries.windows(2) {
        assert_eq!(pair[1].from_block, pair[0].to_block + 1);
    }
}

#[tokio::test]
async fn test_range_clamped_to_max_window() {
    let chain = FakeChain::new();
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();

    let report = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(ScanSettings {
            max_window: 100,
            ..settings(50)
        })
        .scan_with_report("Transfer", 0, 1_000, 10, None)
        .await
        .unwrap();

    assert_eq!(report.effective_from, 900);
    assert_eq!(chain.queries()[0].from_block, 900);
}

#[tokio::test]
async fn test_failing_window_is_skipped() {
    let chain = FakeChain::new();
    for block in [5, 15, 25, 35, 45] {
        chain.add_log(transfer_log(TOKEN, block, 0, ALICE, BOB, ether(1)));
    }
    chain.fail_window_starting_at(20);
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();

    let report = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(settings(10))
        .scan_with_report("Transfer", 0, 45, 100, None)
        .await
        .unwrap();

    let blocks: Vec<u64> = report.records.iter().map(|r| r.block_number).collect();
    assert_eq!(blocks, vec![5, 15, 35, 45]);
    assert!(!report.is_complete());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!((report.skipped[0].from, report.skipped[0].to), (20, 29));
}

#[tokio::test]
async fn test_cap_stops_querying() {
    let chain = FakeChain::new();
    for block in [1, 2, 11, 12, 21, 22] {
        chain.add_log(transfer_log(TOKEN, block, 0, ALICE, BOB, ether(1)));
    }
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();

    let report = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(settings(10))
        .scan_with_report("Transfer", 0, 29, 3, None)
        .await
        .unwrap();

    assert_eq!(report.records.len(), 3);
    assert!(report.cap_reached);
    assert_eq!(report.windows_queried, 2);
    assert_eq!(chain.queries().len(), 2);
}

#[tokio::test]
async fn test_filter_and_ordering() {
    let chain = FakeChain::new();
    // same block, logs out of order
    chain.add_log(transfer_log(TOKEN, 7, 3, ALICE, BOB, ether(3)));
    chain.add_log(transfer_log(TOKEN, 7, 1, BOB, ALICE, ether(1)));
    chain.add_log(transfer_log(TOKEN, 3, 0, ALICE, BOB, ether(2)));
    chain.add_log(transfer_log(TOKEN, 9, 0, ALICE, ALICE, ether(4)));
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();

    // lowercase filter value still matches the checksummed decoded address
    let filter = FieldFilter::new().with("to", format!("{:#x}", BOB));
    let records = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(settings(1_000))
        .scan("Transfer", 0, 20, 10, Some(&filter))
        .await
        .unwrap();

    let positions: Vec<(u64, u64)> = records.iter().map(|r| (r.block_number, r.log_index)).collect();
    assert_eq!(positions, vec![(3, 0), (7, 3)]);
    assert!(records.iter().all(|r| filter.matches(&r.return_values)));
    for pair in records.windows(2) {
        assert!(pair[0].block_number <= pair[1].block_number);
    }
}

#[tokio::test]
async fn test_invalid_requests_make_no_calls() {
    let chain = FakeChain::new();
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();
    let scanner = RangeScanner::new(&handle, TOKEN, &registry).with_settings(settings(10));

    let err = scanner.scan("Transfer", 100, 50, 10, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = scanner.scan("Transfer", 0, 50, 0, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = scanner.scan("Swap", 0, 50, 10, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    assert_eq!(chain.rpc_calls(), 0);
}

fn delayed(window_size: u64, delay: Duration) -> ScanSettings {
    ScanSettings {
        window_delay: delay,
        ..settings(window_size)
    }
}

#[tokio::test(start_paused = true)]
async fn test_delay_only_between_windows() {
    let chain = FakeChain::new();
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();
    let delay = Duration::from_millis(100);

    let started = tokio::time::Instant::now();
    let report = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(delayed(10, delay))
        .scan_with_report("Transfer", 0, 45, 100, None)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.windows_queried, 5);
    // four gaps, nothing after the last window
    assert!(elapsed >= delay * 4, "elapsed {:?}", elapsed);
    assert!(elapsed < delay * 5, "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_no_delay_after_cap() {
    let chain = FakeChain::new();
    for block in [1, 2, 11, 12, 21] {
        chain.add_log(transfer_log(TOKEN, block, 0, ALICE, BOB, ether(1)));
    }
    let handle = common::handle(chain.clone());
    let registry = AbiRegistry::erc20();
    let delay = Duration::from_millis(100);

    let started = tokio::time::Instant::now();
    let report = RangeScanner::new(&handle, TOKEN, &registry)
        .with_settings(delayed(10, delay))
        .scan_with_report("Transfer", 0, 29, 3, None)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(report.cap_reached);
    assert_eq!(report.windows_queried, 2);
    // one gap between the two windows, none once the cap is hit
    assert!(elapsed >= delay, "elapsed {:?}", elapsed);
    assert!(elapsed < delay * 2, "elapsed {:?}", elapsed);
}
