//! Event log decoder implementation using alloy-dyn-abi

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::B256;
use anyhow::{bail, Context, Result};

use crate::domain::abi::{DecodedArg, DecodedLog, EventSignature, LogDecoder, ParamSpec};
use crate::modules::toolkit::convert::display_value;

/// Log decoder implementation using alloy-dyn-abi
#[derive(Debug, Default, Clone, Copy)]
pub struct AlloyLogDecoder;

impl AlloyLogDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl LogDecoder for AlloyLogDecoder {
    fn decode_log(&self, event: &EventSignature, topics: &[B256], data: &[u8]) -> Result<DecodedLog> {
        // topic0 carries the signature hash unless the event is anonymous
        let indexed_topics = if event.anonymous {
            topics
        } else {
            let Some(topic0) = topics.first() else {
                bail!("log has no topics");
            };
            if *topic0 != event.topic0 {
                bail!(
                    "topic mismatch: got {:#x}, expected {:#x} ({})",
                    topic0,
                    event.topic0,
                    event.signature
                );
            }
            &topics[1..]
        };

        let indexed_count = event.inputs.iter().filter(|p| p.indexed).count();
        if indexed_topics.len() < indexed_count {
            bail!(
                "expected {} indexed topics, log has {}",
                indexed_count,
                indexed_topics.len()
            );
        }

        // Parse types of the data section
        let body_types: Vec<DynSolType> = event
            .inputs
            .iter()
            .filter(|p| !p.indexed)
            .map(parse_type)
            .collect::<Result<Vec<_>>>()?;

        let mut body_values = if body_types.is_empty() {
            Vec::new()
        } else {
            let decoded = DynSolType::Tuple(body_types)
                .abi_decode_params(data)
                .context("Failed to decode log data")?;
            match decoded {
                DynSolValue::Tuple(values) => values,
                other => vec![other],
            }
        }
        .into_iter();

        let mut topic_iter = indexed_topics.iter();
        let mut arguments = Vec::with_capacity(event.inputs.len());

        for (idx, param) in event.inputs.iter().enumerate() {
            let name = if param.name.trim().is_empty() {
                format!("arg{}", idx)
            } else {
                param.name.clone()
            };

            let (value, hashed) = if param.indexed {
                let topic = topic_iter
                    .next()
                    .context("ran out of topics while decoding")?;
                if param.is_dynamic() {
                    (format!("{:#x}", topic), true)
                } else {
                    let ty = parse_type(param)?;
                    let value = ty
                        .abi_decode(topic.as_slice())
                        .with_context(|| format!("Failed to decode indexed param '{}'", name))?;
                    (display_value(&value), false)
                }
            } else {
                let value = body_values
                    .next()
                    .context("ran out of data values while decoding")?;
                (display_value(&value), false)
            };

            arguments.push(DecodedArg {
                name,
                kind: param.kind.clone(),
                value,
                hashed,
            });
        }

        Ok(DecodedLog {
            event_name: event.name.clone(),
            signature: event.signature.clone(),
            arguments,
        })
    }
}

fn parse_type(param: &ParamSpec) -> Result<DynSolType> {
    param
        .kind
        .parse::<DynSolType>()
        .with_context(|| format!("Failed to parse type '{}' for param '{}'", param.kind, param.name))
}
