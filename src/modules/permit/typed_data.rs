//! EIP-712 typed data for EIP-2612 permits

use alloy::primitives::{Address, Signature, B256, U256};
use alloy::sol;
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use serde_json::{json, Value};

use crate::core::{Error, Result};
use crate::domain::{PermitRequest, PermitSignature};

sol! {
    #[derive(Debug)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}

pub fn permit_domain(request: &PermitRequest) -> Eip712Domain {
    eip712_domain! {
        name: request.domain_name.clone(),
        version: request.domain_version.clone(),
        chain_id: request.chain_id,
        verifying_contract: request.token_contract,
    }
}

/// Digest the owner signs
pub fn signing_hash(request: &PermitRequest) -> B256 {
    let permit = Permit {
        owner: request.owner,
        spender: request.spender,
        value: request.value,
        nonce: request.nonce,
        deadline: U256::from(request.deadline),
    };
    permit.eip712_signing_hash(&permit_domain(request))
}

/// What a wallet is asked to sign
///
/// `payload` is the `eth_signTypedData_v4` document, integers as decimal
/// strings; `signing_hash` is its digest for wallets that sign hashes.
#[derive(Debug, Clone)]
pub struct TypedDataRequest {
    pub account: Address,
    pub payload: Value,
    pub signing_hash: B256,
}

impl TypedDataRequest {
    pub fn for_permit(request: &PermitRequest) -> Self {
        let payload = json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" }
                ],
                "Permit": [
                    { "name": "owner", "type": "address" },
                    { "name": "spender", "type": "address" },
                    { "name": "value", "type": "uint256" },
                    { "name": "nonce", "type": "uint256" },
                    { "name": "deadline", "type": "uint256" }
                ]
            },
            "primaryType": "Permit",
            "domain": {
                "name": request.domain_name,
                "version": request.domain_version,
                "chainId": request.chain_id.to_string(),
                "verifyingContract": request.token_contract.to_checksum(None)
            },
            "message": {
                "owner": request.owner.to_checksum(None),
                "spender": request.spender.to_checksum(None),
                "value": request.value.to_string(),
                "nonce": request.nonce.to_string(),
                "deadline": request.deadline.to_string()
            }
        });

        Self {
            account: request.owner,
            payload,
            signing_hash: signing_hash(request),
        }
    }
}

/// Split a 65-byte `r || s || v` signature; v is normalised to 27/28
pub fn split_signature(bytes: &[u8]) -> Result<PermitSignature> {
    if bytes.len() != 65 {
        return Err(Error::InvalidInput(format!(
            "signature must be 65 bytes, got {}",
            bytes.len()
        )));
    }
    let mut v = bytes[64];
    if v < 27 {
        v += 27;
    }
    if v != 27 && v != 28 {
        return Err(Error::InvalidInput(format!("invalid signature recovery id {}", bytes[64])));
    }
    Ok(PermitSignature {
        v,
        r: B256::from_slice(&bytes[..32]),
        s: B256::from_slice(&bytes[32..64]),
    })
}

/// Address that produced `bytes` over `hash`
pub fn recover_signer(bytes: &[u8], hash: &B256) -> Result<Address> {
    let signature = Signature::from_raw(bytes)
        .map_err(|err| Error::InvalidInput(format!("malformed signature: {}", err)))?;
    signature
        .recover_address_from_prehash(hash)
        .map_err(|err| Error::InvalidInput(format!("signature recovery failed: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::Signer;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn request(owner: Address) -> PermitRequest {
        PermitRequest {
            token_contract: Address::repeat_byte(0xaa),
            owner,
            spender: Address::repeat_byte(0xbb),
            value: U256::from(1_000u64),
            nonce: U256::ZERO,
            deadline: 1_700_000_600,
            chain_id: 1001,
            domain_name: "Test Token".to_string(),
            domain_version: "1".to_string(),
        }
    }

    #[test]
    fn test_split_signature() {
        let mut bytes = vec![0x11; 32];
        bytes.extend(vec![0x22; 32]);
        bytes.push(1);

        let sig = split_signature(&bytes).unwrap();
        assert_eq!(sig.v, 28);
        assert_eq!(sig.r, B256::repeat_byte(0x11));
        assert_eq!(sig.s, B256::repeat_byte(0x22));

        bytes[64] = 27;
        assert_eq!(split_signature(&bytes).unwrap().v, 27);

        bytes[64] = 5;
        assert!(split_signature(&bytes).is_err());
        assert!(split_signature(&bytes[..64]).is_err());
    }

    #[test]
    fn test_payload_shape() {
        let typed = TypedDataRequest::for_permit(&request(Address::repeat_byte(0x01)));
        assert_eq!(typed.payload["primaryType"], "Permit");
        assert_eq!(typed.payload["domain"]["chainId"], "1001");
        assert_eq!(typed.payload["message"]["value"], "1000");
        assert_eq!(typed.payload["types"]["Permit"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_hash_depends_on_domain() {
        let owner = Address::repeat_byte(0x01);
        let mut other = request(owner);
        other.chain_id = 1;
        assert_ne!(signing_hash(&request(owner)), signing_hash(&other));
    }

    #[tokio::test]
    async fn test_signature_recovers_owner() {
        let signer: PrivateKeySigner = TEST_KEY.parse().unwrap();
        let permit = request(signer.address());
        let hash = signing_hash(&permit);

        let signature = signer.sign_hash(&hash).await.unwrap();
        let bytes = signature.as_bytes();

        assert_eq!(recover_signer(&bytes, &hash).unwrap(), signer.address());
        let split = split_signature(&bytes).unwrap();
        assert!(split.v == 27 || split.v == 28);
    }
}
