//! ERC-20 / EIP-2612 call encoding and return decoding

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy_dyn_abi::{DynSolType, DynSolValue};
use anyhow::{bail, Context, Result};

use super::ChainClient;
use crate::domain::PermitSignature;

sol! {
    #[derive(Debug)]
    interface IERC20Permit {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function version() external view returns (string);
        function balanceOf(address owner) external view returns (uint256);
        function nonces(address owner) external view returns (uint256);
        function permit(address owner, address spender, uint256 value, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external;
        function transferFrom(address from, address to, uint256 value) external returns (bool);
    }
}

pub async fn name(client: &dyn ChainClient, token: Address) -> Result<String> {
    let data = IERC20Permit::nameCall {}.abi_encode();
    call_string(client, token, data).await.context("name()")
}

pub async fn symbol(client: &dyn ChainClient, token: Address) -> Result<String> {
    let data = IERC20Permit::symbolCall {}.abi_encode();
    call_string(client, token, data).await.context("symbol()")
}

/// EIP-712 domain version; not every permit token exposes it
pub async fn version(client: &dyn ChainClient, token: Address) -> Result<String> {
    let data = IERC20Permit::versionCall {}.abi_encode();
    call_string(client, token, data).await.context("version()")
}

pub async fn decimals(client: &dyn ChainClient, token: Address) -> Result<u8> {
    let data = IERC20Permit::decimalsCall {}.abi_encode();
    let value = call_uint(client, token, data).await.context("decimals()")?;
    u8::try_from(value).context("decimals() out of range")
}

pub async fn balance_of(client: &dyn ChainClient, token: Address, owner: Address) -> Result<U256> {
    let data = IERC20Permit::balanceOfCall { owner }.abi_encode();
    call_uint(client, token, data).await.context("balanceOf()")
}

pub async fn nonces(client: &dyn ChainClient, token: Address, owner: Address) -> Result<U256> {
    let data = IERC20Permit::noncesCall { owner }.abi_encode();
    call_uint(client, token, data).await.context("nonces()")
}

pub fn encode_permit(
    owner: Address,
    spender: Address,
    value: U256,
    deadline: u64,
    signature: &PermitSignature,
) -> Bytes {
    IERC20Permit::permitCall {
        owner,
        spender,
        value,
        deadline: U256::from(deadline),
        v: signature.v,
        r: signature.r,
        s: signature.s,
    }
    .abi_encode()
    .into()
}

pub fn encode_transfer_from(from: Address, to: Address, value: U256) -> Bytes {
    IERC20Permit::transferFromCall { from, to, value }.abi_encode().into()
}

async fn call_string(client: &dyn ChainClient, token: Address, data: Vec<u8>) -> Result<String> {
    let output = client.call(token, data.into()).await?;
    match decode_single(&output, DynSolType::String)? {
        DynSolValue::String(s) => Ok(s),
        other => bail!("expected string, got {:?}", other),
    }
}

async fn call_uint(client: &dyn ChainClient, token: Address, data: Vec<u8>) -> Result<U256> {
    let output = client.call(token, data.into()).await?;
    match decode_single(&output, DynSolType::Uint(256))? {
        DynSolValue::Uint(value, _) => Ok(value),
        other => bail!("expected uint, got {:?}", other),
    }
}

/// Decode return data holding exactly one value
fn decode_single(output: &[u8], ty: DynSolType) -> Result<DynSolValue> {
    if output.is_empty() {
        bail!("empty return data");
    }
    let decoded = DynSolType::Tuple(vec![ty])
        .abi_decode_params(output)
        .context("failed to decode return data")?;
    match decoded {
        DynSolValue::Tuple(mut values) if values.len() == 1 => Ok(values.remove(0)),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    #[test]
    fn test_selectors() {
        assert_eq!(IERC20Permit::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(IERC20Permit::transferFromCall::SELECTOR, [0x23, 0xb8, 0x72, 0xdd]);
        assert_eq!(IERC20Permit::permitCall::SELECTOR, [0xd5, 0x05, 0xac, 0xcf]);
        assert_eq!(IERC20Permit::noncesCall::SELECTOR, [0x7e, 0xce, 0xbe, 0x00]);
    }

    #[test]
    fn test_encode_permit_layout() {
        let signature = PermitSignature {
            v: 27,
            r: B256::repeat_byte(0x11),
            s: B256::repeat_byte(0x22),
        };
        let data = encode_permit(Address::ZERO, Address::ZERO, U256::from(5u64), 600, &signature);
        assert_eq!(data.len(), 4 + 7 * 32);
        assert_eq!(&data[..4], &IERC20Permit::permitCall::SELECTOR);
        // v is the fifth word
        assert_eq!(data[4 + 5 * 32 - 1], 27);
    }

    #[test]
    fn test_decode_string_return() {
        let encoded = DynSolValue::Tuple(vec![DynSolValue::String("Token".to_string())]).abi_encode_params();
        let decoded = decode_single(&encoded, DynSolType::String).unwrap();
        assert_eq!(decoded, DynSolValue::String("Token".to_string()));
        assert!(decode_single(&[], DynSolType::String).is_err());
    }
}
