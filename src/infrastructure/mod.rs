//! Adapters to the outside world
//!
//! `ethereum` wraps the JSON-RPC node behind `ChainClient`, `indexer` the
//! Etherscan-style account API behind `IndexerClient`, and `abi` holds log
//! decoding plus the Sourcify fallback.

pub mod abi;
pub mod ethereum;
pub mod indexer;
