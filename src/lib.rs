//! chainlens: explorer and relay toolkit for EVM networks
//!
//! Range scans of contract events, paginated account history, contract
//! introspection and a gasless EIP-2612 permit relay, all driven through a
//! swappable `ChainHandle`.

pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod modules;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber; `RUST_LOG` overrides the `info` default
///
/// Logs go to stderr so stdout stays clean for JSON and CSV output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .try_init();
}
