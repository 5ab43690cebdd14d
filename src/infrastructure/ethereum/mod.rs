//! JSON-RPC access: the `ChainClient` seam, its Alloy implementation, ERC-20 calls

pub mod erc20;
mod provider;
pub mod types;

pub use provider::{
    create_provider, AlloyProvider, BlockTag, ChainClient, LogQuery, ProviderConfig, RawBlock,
    RawLog, RawTransaction,
};
pub(crate) use provider::parse_raw_transaction;
