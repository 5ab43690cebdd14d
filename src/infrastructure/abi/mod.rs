//! ABI infrastructure - Alloy-based log decoding and Sourcify lookups

mod decoder;
mod resolver;

pub use decoder::AlloyLogDecoder;
pub use resolver::{AbiResolver, ResolvedAbi};
