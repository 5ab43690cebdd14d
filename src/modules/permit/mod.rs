//! Permit relay: the owner signs an EIP-2612 permit off-chain and a fee payer
//! submits `permit` followed by `transferFrom`
//!
//! The flow is strictly linear and never retries. The transfer is only
//! attempted once the permit receipt reports success; a transfer failure
//! after that is a `PartialFailure` because the allowance is already live.

mod relay;
mod typed_data;
mod wallet;

use alloy::primitives::{Address, B256, U256};
use serde::Serialize;

use crate::core::{ChainHandle, Error, Result};
use crate::domain::{PermitRequest, PermitSignature};
use crate::infrastructure::ethereum::erc20;
use crate::modules::toolkit::convert::ETHER_DECIMALS;
use crate::modules::toolkit::{parse_address, parse_units};
use crate::store::{NewAttempt, RelayJournal};

pub use relay::{submit, wait_for_receipt, FeePayer, RelaySettings};
pub use typed_data::{permit_domain, recover_signer, signing_hash, split_signature, TypedDataRequest};
pub use wallet::{
    normalize_private_key, parse_signer, ConfirmingWallet, LocalKeyWallet, WalletApproval,
    WalletProvider,
};

/// Raw user input for one relay
#[derive(Clone)]
pub struct RelayForm {
    pub token: String,
    /// Decimal token amount, e.g. `"1.5"`
    pub amount: String,
    /// Fee payer address; receives the allowance
    pub spender: String,
    pub recipient: String,
    pub fee_payer_key: String,
}

impl std::fmt::Debug for RelayForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayForm")
            .field("token", &self.token)
            .field("amount", &self.amount)
            .field("spender", &self.spender)
            .field("recipient", &self.recipient)
            .finish_non_exhaustive()
    }
}

/// Form after local validation; nothing here touched the network
#[derive(Debug)]
pub struct ValidatedForm {
    pub token: Address,
    pub value: U256,
    pub spender: Address,
    pub recipient: Address,
    pub fee_payer: FeePayer,
}

impl RelayForm {
    pub fn validate(&self) -> Result<ValidatedForm> {
        let token = parse_address(&self.token)?;
        let spender = parse_address(&self.spender)?;
        let recipient = parse_address(&self.recipient)?;

        let value = parse_units(&self.amount, ETHER_DECIMALS)?;
        if value.is_zero() {
            return Err(Error::InvalidInput("amount must be greater than zero".to_string()));
        }

        let fee_payer = FeePayer::from_key(&self.fee_payer_key)?;
        if fee_payer.address() != spender {
            return Err(Error::InvalidInput(format!(
                "fee payer key controls {}, not the spender {}",
                fee_payer.address(),
                spender
            )));
        }

        Ok(ValidatedForm {
            token,
            value,
            spender,
            recipient,
            fee_payer,
        })
    }
}

/// A permit and the owner's signature over it; consumed by submission
#[derive(Debug)]
pub struct SignedPermit {
    pub request: PermitRequest,
    pub signature: PermitSignature,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayReceipt {
    pub owner: Address,
    pub permit_tx: B256,
    pub transfer_tx: B256,
    pub journal_id: Option<i64>,
}

pub struct PermitRelay<'a> {
    handle: &'a ChainHandle,
    wallet: &'a dyn WalletProvider,
    journal: Option<&'a RelayJournal>,
    settings: RelaySettings,
}

impl<'a> PermitRelay<'a> {
    pub fn new(handle: &'a ChainHandle, wallet: &'a dyn WalletProvider) -> Self {
        Self {
            handle,
            wallet,
            journal: None,
            settings: RelaySettings::default(),
        }
    }

    pub fn with_journal(mut self, journal: &'a RelayJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_settings(mut self, settings: RelaySettings) -> Self {
        self.settings = settings;
        self
    }

    #[tracing::instrument(skip(self, form), fields(network = %self.handle.name(), token = %form.token))]
    pub async fn run(&self, form: &RelayForm) -> Result<RelayReceipt> {
        let owner = self.connect().await?;
        let form = form.validate()?;
        tracing::info!(%owner, spender = %form.spender, recipient = %form.recipient, "relay validated");

        let request = self.gather(owner, &form).await?;
        let signed = self.sign(request).await?;
        let journal_id = self.record(&signed, &form)?;

        let SignedPermit { request, signature } = signed;

        let permit_input = erc20::encode_permit(
            request.owner,
            request.spender,
            request.value,
            request.deadline,
            &signature,
        );
        let permit = match submit(self.handle, &form.fee_payer, form.token, permit_input, &self.settings).await {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(error = %err, "permit submission failed");
                self.journal_update(journal_id, |journal, id| journal.mark_failed(id, &err.to_string()));
                return Err(err);
            }
        };
        let permit_tx = format!("{:#x}", permit.transaction_hash);
        tracing::info!(tx = %permit_tx, "permit mined");
        self.journal_update(journal_id, |journal, id| journal.record_permit(id, &permit_tx));

        let transfer_input = erc20::encode_transfer_from(request.owner, form.recipient, request.value);
        let transfer = match submit(self.handle, &form.fee_payer, form.token, transfer_input, &self.settings).await {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(permit_tx = %permit_tx, error = %err, "transfer failed after permit");
                self.journal_update(journal_id, |journal, id| journal.mark_partial(id, &err.to_string()));
                return Err(Error::PartialFailure {
                    permit_tx,
                    source: Box::new(err),
                });
            }
        };
        let transfer_tx = format!("{:#x}", transfer.transaction_hash);
        self.journal_update(journal_id, |journal, id| journal.complete(id, &transfer_tx));
        tracing::info!(permit_tx = %permit_tx, transfer_tx = %transfer_tx, "relay complete");

        Ok(RelayReceipt {
            owner: request.owner,
            permit_tx: permit.transaction_hash,
            transfer_tx: transfer.transaction_hash,
            journal_id,
        })
    }

    async fn connect(&self) -> Result<Address> {
        let accounts = self.wallet.request_accounts().await?;
        accounts
            .first()
            .copied()
            .ok_or_else(|| Error::WalletUnavailable("wallet exposed no accounts".to_string()))
    }

    /// Read the domain and nonce from the token; calls run one after another
    async fn gather(&self, owner: Address, form: &ValidatedForm) -> Result<PermitRequest> {
        let client = self.handle.client.as_ref();

        let domain_name = erc20::name(client, form.token).await.map_err(Error::from_rpc)?;
        let domain_version = match erc20::version(client, form.token).await {
            Ok(version) if !version.is_empty() => version,
            Ok(_) => "1".to_string(),
            Err(err) => {
                tracing::debug!(error = %err, "version() unavailable, using \"1\"");
                "1".to_string()
            }
        };
        let chain_id = self.handle.node_chain_id().await?;
        let nonce = erc20::nonces(client, form.token, owner).await.map_err(Error::from_rpc)?;
        let deadline = chrono::Utc::now().timestamp().max(0) as u64 + self.settings.deadline_secs;

        tracing::debug!(%domain_name, %domain_version, chain_id, %nonce, deadline, "permit data gathered");

        Ok(PermitRequest {
            token_contract: form.token,
            owner,
            spender: form.spender,
            value: form.value,
            nonce,
            deadline,
            chain_id,
            domain_name,
            domain_version,
        })
    }

    async fn sign(&self, request: PermitRequest) -> Result<SignedPermit> {
        let typed = TypedDataRequest::for_permit(&request);
        let bytes = match self.wallet.sign_typed_data(&typed).await {
            WalletApproval::Approved(bytes) => bytes,
            WalletApproval::Denied => return Err(Error::SignatureDenied),
            WalletApproval::Unavailable(reason) => return Err(Error::WalletUnavailable(reason)),
        };

        let signature = split_signature(&bytes)?;
        let signer = recover_signer(&bytes, &typed.signing_hash)?;
        if signer != request.owner {
            return Err(Error::InvalidInput(format!(
                "signature recovers to {}, expected owner {}",
                signer, request.owner
            )));
        }

        Ok(SignedPermit { request, signature })
    }

    /// Journal the attempt before the first broadcast
    fn record(&self, signed: &SignedPermit, form: &ValidatedForm) -> Result<Option<i64>> {
        let Some(journal) = self.journal else {
            return Ok(None);
        };
        let request = &signed.request;
        let seen = journal
            .contains(request.chain_id, request.token_contract, request.owner, request.nonce, request.deadline)
            .map_err(Error::store)?;
        if seen {
            return Err(Error::InvalidInput(format!(
                "permit with nonce {} was already relayed",
                request.nonce
            )));
        }
        let id = journal
            .begin(&NewAttempt {
                chain_id: request.chain_id,
                token: request.token_contract,
                owner: request.owner,
                spender: request.spender,
                recipient: form.recipient,
                value: request.value,
                nonce: request.nonce,
                deadline: request.deadline,
            })
            .map_err(Error::store)?;
        Ok(Some(id))
    }

    /// Journal writes after a broadcast must not mask the chain outcome
    fn journal_update(
        &self,
        id: Option<i64>,
        update: impl FnOnce(&RelayJournal, i64) -> anyhow::Result<()>,
    ) {
        if let (Some(journal), Some(id)) = (self.journal, id) {
            if let Err(err) = update(journal, id) {
                tracing::warn!(id, error = %format!("{:#}", err), "failed to update relay journal");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE_PAYER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const FEE_PAYER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn form() -> RelayForm {
        RelayForm {
            token: "0x1111111111111111111111111111111111111111".to_string(),
            amount: "1.5".to_string(),
            spender: FEE_PAYER.to_string(),
            recipient: "0x2222222222222222222222222222222222222222".to_string(),
            fee_payer_key: FEE_PAYER_KEY.to_string(),
        }
    }

    #[test]
    fn test_validate_ok() {
        let validated = form().validate().unwrap();
        assert_eq!(validated.value, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(validated.fee_payer.address(), validated.spender);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut bad = form();
        bad.amount = "0".to_string();
        assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));

        let mut bad = form();
        bad.amount = "1.0000000000000000001".to_string();
        assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));

        let mut bad = form();
        bad.recipient = "0x1234".to_string();
        assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));

        let mut bad = form();
        bad.fee_payer_key = "not a key".to_string();
        assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));

        let mut bad = form();
        bad.spender = "0x3333333333333333333333333333333333333333".to_string();
        assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_form_debug_hides_key() {
        assert!(!format!("{:?}", form()).contains(FEE_PAYER_KEY));
    }
}
