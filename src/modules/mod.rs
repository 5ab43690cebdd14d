//! Operations built on a `ChainHandle`
//!
//! - scanner: chunked event retrieval over a block range
//! - history: paginated transaction history from the indexer
//! - permit: EIP-2612 permit signing and relayed transfer
//! - inspect: contract code, source and ABI surface
//! - explorer: block, transaction, receipt and address lookups
//! - stats: network stats and their background refresh
//! - export: CSV and JSON writers for list results
//! - toolkit: value normalisation and format checks

pub mod explorer;
pub mod export;
pub mod history;
pub mod inspect;
pub mod permit;
pub mod scanner;
pub mod stats;
pub mod toolkit;
