pub mod context;
pub mod error;

pub use context::{ChainHandle, Session};
pub use error::{Error, Result, RpcResultExt};
