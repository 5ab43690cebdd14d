//! Contract surface: function and event signatures, and the log decoding seam
//!
//! The concrete decoder lives in `infrastructure::abi`.

mod decoder;
mod registry;

pub use decoder::{DecodedArg, DecodedLog, LogDecoder};
pub use registry::{AbiRegistry, EventSignature, FunctionSignature, ParamSpec};
