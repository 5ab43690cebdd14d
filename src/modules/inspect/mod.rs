//! Contract introspection: code, verified source, proxy resolution, ABI surface

use alloy::primitives::Address;
use alloy_json_abi::{Event, JsonAbi};

use crate::core::{ChainHandle, Result, RpcResultExt};
use crate::domain::abi::AbiRegistry;
use crate::domain::{ContractDescriptor, DescriptorError};
use crate::modules::toolkit::parse_address;
use crate::store::AbiCache;

/// Where an ABI came from and what the indexer said about the contract
#[derive(Debug, Default)]
struct SourceInfo {
    abi_json: Option<String>,
    contract_name: Option<String>,
    is_verified: bool,
    is_proxy: bool,
    implementation: Option<Address>,
    /// Why nothing was found, when lookups failed rather than came back empty
    failure: Option<String>,
}

/// Describe the contract at `address`
///
/// Lookup failures after the code check degrade the descriptor to
/// `AbiUnavailable`; only the code read itself is fatal.
#[tracing::instrument(skip(handle, cache), fields(network = %handle.name()))]
pub async fn describe(
    handle: &ChainHandle,
    cache: Option<&AbiCache>,
    address: &str,
) -> Result<ContractDescriptor> {
    introspect(handle, cache, address).await.map(|(descriptor, _)| descriptor)
}

/// ABI registry for decoding a contract's events; ERC-20 when no ABI is known
pub async fn registry(
    handle: &ChainHandle,
    cache: Option<&AbiCache>,
    address: &str,
) -> Result<AbiRegistry> {
    let (descriptor, registry) = introspect(handle, cache, address).await?;
    match registry {
        Some(registry) => Ok(registry),
        None => {
            tracing::info!(address = %descriptor.address, "no ABI available, decoding as ERC-20");
            Ok(AbiRegistry::erc20())
        }
    }
}

async fn introspect(
    handle: &ChainHandle,
    cache: Option<&AbiCache>,
    address: &str,
) -> Result<(ContractDescriptor, Option<AbiRegistry>)> {
    let address = parse_address(address)?;

    let code = handle.client.get_code(address).await.map_rpc()?;
    if code.is_empty() {
        tracing::info!(%address, "no code at address");
        return Ok((ContractDescriptor::not_a_contract(address), None));
    }

    let chain_id = handle.chain_id().await?;
    let source = resolve_source(handle, cache, chain_id, address).await;

    let mut descriptor = ContractDescriptor {
        address: address.to_checksum(None),
        bytecode: format!("0x{}", hex::encode(&code)),
        abi: None,
        contract_name: source.contract_name.clone(),
        functions: Vec::new(),
        events: Vec::new(),
        is_verified: source.is_verified,
        is_proxy: source.is_proxy,
        implementation_address: source.implementation.map(|a| a.to_checksum(None)),
        error: None,
    };

    let Some(text) = source.abi_json else {
        let reason = source
            .failure
            .unwrap_or_else(|| "contract source is not verified".to_string());
        descriptor.error = Some(DescriptorError::AbiUnavailable(reason));
        return Ok((descriptor, None));
    };

    let mut abi: JsonAbi = match serde_json::from_str(&text) {
        Ok(abi) => abi,
        Err(err) => {
            tracing::warn!(%address, error = %err, "malformed ABI");
            descriptor.error = Some(DescriptorError::AbiUnavailable(format!("malformed ABI: {}", err)));
            return Ok((descriptor, None));
        }
    };

    let mut registry = AbiRegistry::from_json_abi(&abi);
    let injected = registry.ensure_standard_events();
    for name in &injected {
        if let Some(event) = registry.event(name) {
            match Event::parse(&format!("event {}", human_readable(event))) {
                Ok(parsed) => abi.events.entry(parsed.name.clone()).or_default().push(parsed),
                Err(err) => tracing::warn!(event = %name, error = %err, "could not add standard event to ABI"),
            }
        }
    }
    if !injected.is_empty() {
        tracing::debug!(?injected, "standard events added");
    }

    descriptor.functions = registry.functions();
    descriptor.events = registry.events().to_vec();
    descriptor.abi = Some(abi);

    tracing::info!(
        %address,
        name = ?descriptor.contract_name,
        proxy = descriptor.is_proxy,
        functions = descriptor.functions.len(),
        events = descriptor.events.len(),
        "contract described"
    );

    Ok((descriptor, Some(registry)))
}

fn human_readable(event: &crate::domain::abi::EventSignature) -> String {
    let params: Vec<String> = event
        .inputs
        .iter()
        .map(|p| {
            if p.indexed {
                format!("{} indexed {}", p.kind, p.name)
            } else {
                format!("{} {}", p.kind, p.name)
            }
        })
        .collect();
    format!("{}({})", event.name, params.join(", "))
}

/// Cache, then indexer source entry, then indexer ABI, then Sourcify
async fn resolve_source(
    handle: &ChainHandle,
    cache: Option<&AbiCache>,
    chain_id: u64,
    address: Address,
) -> SourceInfo {
    let key = format!("{:#x}", address);

    if let Some(cache) = cache {
        match cache.get_abi(chain_id, &key) {
            Ok(Some(cached)) => {
                tracing::debug!(%address, "ABI cache hit");
                let implementation = cached
                    .implementation
                    .as_deref()
                    .and_then(|a| a.parse::<Address>().ok());
                return SourceInfo {
                    abi_json: Some(cached.abi_json),
                    contract_name: cached.contract_name,
                    is_verified: true,
                    is_proxy: implementation.is_some(),
                    implementation,
                    failure: None,
                };
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %format!("{:#}", err), "ABI cache read failed"),
        }
    }

    let mut info = SourceInfo::default();

    if let Some(indexer) = handle.indexer.as_deref() {
        match indexer.contract_source(address).await {
            Ok(Some(source)) => {
                info.contract_name = source.contract_name;
                info.is_verified = source.abi.is_some();
                info.is_proxy = source.is_proxy;
                info.implementation = source.implementation;
                info.abi_json = source.abi;

                if let Some(implementation) = info.implementation.filter(|_| info.is_proxy) {
                    match indexer.contract_abi(implementation).await {
                        Ok(Some(abi)) => {
                            tracing::debug!(%address, %implementation, "using implementation ABI");
                            info.abi_json = Some(abi);
                        }
                        Ok(None) => {
                            tracing::warn!(%implementation, "implementation is not verified, keeping proxy ABI")
                        }
                        Err(err) => {
                            tracing::warn!(%implementation, error = %format!("{:#}", err), "implementation ABI lookup failed")
                        }
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%address, error = %format!("{:#}", err), "source lookup failed");
                info.failure = Some(format!("{:#}", err));
            }
        }

        if info.abi_json.is_none() {
            match indexer.contract_abi(address).await {
                Ok(Some(abi)) => {
                    info.is_verified = true;
                    info.abi_json = Some(abi);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%address, error = %format!("{:#}", err), "ABI lookup failed");
                    info.failure = Some(format!("{:#}", err));
                }
            }
        }
    }

    if info.abi_json.is_none() {
        if let Some(resolver) = handle.resolver.as_deref() {
            match resolver.lookup_abi(chain_id, address).await {
                Ok(Some(resolved)) => {
                    tracing::debug!(%address, kind = ?resolved.match_kind, "ABI from Sourcify");
                    info.is_verified = true;
                    info.abi_json = Some(resolved.abi_json);
                    if info.contract_name.is_none() {
                        info.contract_name = resolved.contract_name;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%address, error = %format!("{:#}", err), "Sourcify lookup failed");
                    info.failure.get_or_insert_with(|| format!("{:#}", err));
                }
            }
        }
    }

    if let (Some(cache), Some(abi_json)) = (cache, info.abi_json.as_deref()) {
        let implementation = info
            .implementation
            .filter(|_| info.is_proxy)
            .map(|a| format!("{:#x}", a));
        if let Err(err) = cache.save_abi(
            chain_id,
            &key,
            abi_json,
            info.contract_name.as_deref(),
            implementation.as_deref(),
        ) {
            tracing::warn!(error = %format!("{:#}", err), "ABI cache write failed");
        }
    }

    if info.abi_json.is_some() {
        info.failure = None;
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::abi::EventSignature;

    #[test]
    fn test_human_readable_event() {
        assert_eq!(
            human_readable(&EventSignature::erc20_transfer()),
            "Transfer(address indexed from, address indexed to, uint256 value)"
        );
        let parsed = Event::parse(&format!("event {}", human_readable(&EventSignature::erc20_approval()))).unwrap();
        assert_eq!(parsed.selector(), EventSignature::erc20_approval().topic0);
    }
}
