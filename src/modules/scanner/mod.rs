//! Range scanner: chunked, rate-limited, filterable event retrieval
//!
//! A scan walks `[from, to]` in ascending fixed-size windows, one
//! `eth_getLogs` per window, decodes each log against the contract's ABI and
//! keeps the records that pass the field filter until `max_results` is hit.
//! A failing window is skipped and reported; it never aborts the scan.

mod filter;
mod window;

use std::collections::BTreeMap;
use std::time::Duration;

use alloy::primitives::Address;
use serde::Serialize;

use crate::config::ScannerConfig;
use crate::core::{ChainHandle, Error, Result};
use crate::domain::abi::{AbiRegistry, DecodedLog, EventSignature, LogDecoder};
use crate::domain::{EventRecord, EventStatus};
use crate::infrastructure::abi::AlloyLogDecoder;
use crate::infrastructure::ethereum::{LogQuery, RawLog};
use crate::modules::toolkit::convert::format_base_units;

pub use filter::FieldFilter;
pub use window::{effective_from, windows, BlockWindow};

/// Field names whose values are token amounts in base units
const MONETARY_FIELDS: [&str; 4] = ["value", "amount", "wad", "tokens"];

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub window_size: u64,
    /// Only the most recent `max_window` blocks below `to_block` are scanned
    pub max_window: u64,
    pub window_delay: Duration,
    pub token_decimals: u8,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from(&ScannerConfig::default())
    }
}

impl From<&ScannerConfig> for ScanSettings {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            window_size: config.window_size,
            max_window: config.max_window,
            window_delay: config.window_delay(),
            token_decimals: config.token_decimals,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedWindow {
    pub from: u64,
    pub to: u64,
    pub error: String,
}

/// Outcome of a scan, including how complete it is
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub records: Vec<EventRecord>,
    /// Lower bound actually scanned after clamping to `max_window`
    pub effective_from: u64,
    pub to_block: u64,
    pub windows_queried: usize,
    pub skipped: Vec<SkippedWindow>,
    /// Stopped early because `max_results` was reached
    pub cap_reached: bool,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub fn is_monetary_field(name: &str) -> bool {
    let bare = name.trim_start_matches('_').to_ascii_lowercase();
    MONETARY_FIELDS.contains(&bare.as_str())
}

pub struct RangeScanner<'a> {
    handle: &'a ChainHandle,
    contract: Address,
    registry: &'a AbiRegistry,
    decoder: AlloyLogDecoder,
    settings: ScanSettings,
}

impl<'a> RangeScanner<'a> {
    pub fn new(handle: &'a ChainHandle, contract: Address, registry: &'a AbiRegistry) -> Self {
        Self {
            handle,
            contract,
            registry,
            decoder: AlloyLogDecoder::new(),
            settings: ScanSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Matching records in ascending `(block, log_index)` order, at most `max_results`
    pub async fn scan(
        &self,
        event_name: &str,
        from_block: u64,
        to_block: u64,
        max_results: usize,
        filter: Option<&FieldFilter>,
    ) -> Result<Vec<EventRecord>> {
        Ok(self
            .scan_with_report(event_name, from_block, to_block, max_results, filter)
            .await?
            .records)
    }

    #[tracing::instrument(
        skip(self, filter),
        fields(contract = %self.contract, network = %self.handle.name())
    )]
    pub async fn scan_with_report(
        &self,
        event_name: &str,
        from_block: u64,
        to_block: u64,
        max_results: usize,
        filter: Option<&FieldFilter>,
    ) -> Result<ScanReport> {
        if from_block > to_block {
            return Err(Error::InvalidInput(format!(
                "from_block {} is greater than to_block {}",
                from_block, to_block
            )));
        }
        if max_results == 0 {
            return Err(Error::InvalidInput("max_results must be at least 1".to_string()));
        }

        let event = self
            .registry
            .event(event_name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown event: {}", event_name)))?;
        if event.anonymous {
            return Err(Error::InvalidInput(format!(
                "anonymous event {} has no topic to filter on",
                event.name
            )));
        }

        let start = effective_from(from_block, to_block, self.settings.max_window);
        if start > from_block {
            tracing::info!(
                requested_from = from_block,
                effective_from = start,
                max_window = self.settings.max_window,
                "range clamped to most recent blocks"
            );
        }

        let mut report = ScanReport {
            records: Vec::new(),
            effective_from: start,
            to_block,
            windows_queried: 0,
            skipped: Vec::new(),
            cap_reached: false,
        };

        let mut pending = windows(start, to_block, self.settings.window_size).peekable();
        while let Some(window) = pending.next() {
            let query = LogQuery {
                address: self.contract,
                topic0: event.topic0,
                from_block: window.from,
                to_block: window.to,
            };

            tracing::debug!(from = window.from, to = window.to, "querying window");
            report.windows_queried += 1;

            match self.handle.client.get_logs(&query).await {
                Ok(mut logs) => {
                    logs.sort_by_key(|log| (log.block_number.unwrap_or(0), log.log_index.unwrap_or(0)));
                    tracing::debug!(logs = logs.len(), from = window.from, to = window.to, "fetched logs");

                    for log in &logs {
                        let record = self.to_record(event, log);
                        if filter.is_some_and(|f| !f.matches(&record.return_values)) {
                            continue;
                        }
                        report.records.push(record);
                        if report.records.len() >= max_results {
                            report.cap_reached = true;
                            break;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        from = window.from,
                        to = window.to,
                        error = %format!("{:#}", err),
                        "window failed, skipping"
                    );
                    report.skipped.push(SkippedWindow {
                        from: window.from,
                        to: window.to,
                        error: format!("{:#}", err),
                    });
                }
            }

            if report.cap_reached {
                break;
            }
            // Delay between windows to avoid rate limiting
            if pending.peek().is_some() && !self.settings.window_delay.is_zero() {
                tokio::time::sleep(self.settings.window_delay).await;
            }
        }

        tracing::info!(
            event = %event.name,
            from = start,
            to = to_block,
            records = report.records.len(),
            windows = report.windows_queried,
            skipped = report.skipped.len(),
            "scan finished"
        );

        Ok(report)
    }

    fn to_record(&self, event: &EventSignature, log: &RawLog) -> EventRecord {
        let (return_values, status) = match self.decoder.decode_log(event, &log.topics, &log.data) {
            Ok(decoded) => {
                let status = if decoded.is_complete() {
                    EventStatus::Success
                } else {
                    EventStatus::Info
                };
                (self.normalise(decoded), status)
            }
            Err(err) => {
                tracing::warn!(
                    block = log.block_number,
                    tx = ?log.transaction_hash,
                    error = %err,
                    "failed to decode log, keeping raw topics"
                );
                (raw_values(log), EventStatus::Error)
            }
        };

        EventRecord {
            block_number: log.block_number.unwrap_or(0),
            log_index: log.log_index.unwrap_or(0),
            transaction_hash: log
                .transaction_hash
                .map(|hash| format!("{:#x}", hash))
                .unwrap_or_default(),
            event_name: event.name.clone(),
            return_values,
            status,
        }
    }

    /// Format token amounts with the configured decimals
    fn normalise(&self, decoded: DecodedLog) -> BTreeMap<String, String> {
        decoded
            .arguments
            .into_iter()
            .map(|arg| {
                let value = if !arg.hashed && arg.kind.starts_with("uint") && is_monetary_field(&arg.name) {
                    format_base_units(&arg.value, self.settings.token_decimals)
                } else {
                    arg.value
                };
                (arg.name, value)
            })
            .collect()
    }
}

fn raw_values(log: &RawLog) -> BTreeMap<String, String> {
    let mut values: BTreeMap<String, String> = log
        .topics
        .iter()
        .enumerate()
        .map(|(idx, topic)| (format!("topic{}", idx), format!("{:#x}", topic)))
        .collect();
    values.insert("data".to_string(), format!("0x{}", hex::encode(&log.data)));
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monetary_fields() {
        assert!(is_monetary_field("value"));
        assert!(is_monetary_field("_value"));
        assert!(is_monetary_field("wad"));
        assert!(is_monetary_field("Amount"));
        assert!(!is_monetary_field("from"));
        assert!(!is_monetary_field("tokenId"));
    }

    #[test]
    fn test_default_settings() {
        let settings = ScanSettings::default();
        assert_eq!(settings.window_size, 1_000);
        assert_eq!(settings.max_window, 10_000);
        assert_eq!(settings.window_delay, Duration::from_millis(100));
        assert_eq!(settings.token_decimals, 18);
    }
}
