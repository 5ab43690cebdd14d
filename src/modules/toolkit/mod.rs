//! Shared value handling: unit conversion, display sanitation, format checks

pub mod checksum;
pub mod convert;

pub use checksum::{is_valid_address, parse_address, parse_tx_hash, to_checksum_address};
pub use convert::{
    format_units, parse_units, sanitize_for_display, sanitize_json, wei_to_decimal, wei_to_gwei,
};
