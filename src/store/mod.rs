//! SQLite stores: ABI cache and relay journal

mod abi_cache;
mod relay_journal;

pub use abi_cache::{AbiCache, CachedAbi};
pub use relay_journal::{NewAttempt, RelayAttempt, RelayJournal, RelayStatus};
