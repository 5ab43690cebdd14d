//! Domain layer - entities and ABI contracts shared by every module

pub mod abi;
pub mod model;

pub use model::{
    AddressSnapshot, BlockRef, ContractDescriptor, DescriptorError, EventRecord, EventStatus,
    MethodLabel, NetworkStats, PermitRequest, PermitSignature, ReceiptSummary, TokenBalance,
    TransactionRecord,
};
