//! Wallet abstraction: who owns the tokens and signs the permit

use std::io::{BufRead, Write};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use super::typed_data::TypedDataRequest;
use crate::core::{Error, Result};

/// Wallet answer to a signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletApproval {
    /// 65-byte `r || s || v` signature
    Approved(Bytes),
    Denied,
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts the wallet exposes; the first one is the token owner
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> WalletApproval;
}

/// Normalise a raw hex private key to `0x` + 64 lowercase hex chars
pub fn normalize_private_key(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidInput(
            "private key must be 32 bytes of hex".to_string(),
        ));
    }
    Ok(format!("0x{}", hex_part.to_lowercase()))
}

/// Parse a secp256k1 key after normalisation
pub fn parse_signer(input: &str) -> Result<PrivateKeySigner> {
    let normalized = normalize_private_key(input)?;
    normalized
        .parse::<PrivateKeySigner>()
        .map_err(|err| Error::InvalidInput(format!("invalid private key: {}", err)))
}

/// Signs with a locally held owner key
pub struct LocalKeyWallet {
    signer: PrivateKeySigner,
}

impl LocalKeyWallet {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        parse_signer(key).map(Self::new)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl std::fmt::Debug for LocalKeyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyWallet")
            .field("address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl WalletProvider for LocalKeyWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        Ok(vec![self.signer.address()])
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> WalletApproval {
        if request.account != self.signer.address() {
            return WalletApproval::Unavailable(format!(
                "account {} is not managed by this wallet",
                request.account
            ));
        }
        match self.signer.sign_hash(&request.signing_hash).await {
            Ok(signature) => WalletApproval::Approved(Bytes::from(signature.as_bytes().to_vec())),
            Err(err) => WalletApproval::Unavailable(err.to_string()),
        }
    }
}

type Confirm = Arc<dyn Fn(&TypedDataRequest) -> bool + Send + Sync>;

/// Asks before every signature; a refusal is reported as `Denied`
///
/// The confirmation runs on the blocking pool, so it may wait on a terminal.
pub struct ConfirmingWallet<W> {
    inner: W,
    confirm: Confirm,
}

impl<W: WalletProvider> ConfirmingWallet<W> {
    pub fn new(inner: W, confirm: impl Fn(&TypedDataRequest) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner,
            confirm: Arc::new(confirm),
        }
    }

    /// Print the typed data on stderr and read y/N from stdin
    pub fn terminal(inner: W) -> Self {
        Self::new(inner, |request| {
            let pretty = serde_json::to_string_pretty(&request.payload).unwrap_or_default();
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "Signature requested for {}:\n{}", request.account, pretty);
            let _ = write!(stderr, "Sign this permit? [y/N] ");
            let _ = stderr.flush();

            let mut answer = String::new();
            if std::io::stdin().lock().read_line(&mut answer).is_err() {
                return false;
            }
            matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
        })
    }
}

#[async_trait::async_trait]
impl<W: WalletProvider> WalletProvider for ConfirmingWallet<W> {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.inner.request_accounts().await
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> WalletApproval {
        let confirm = Arc::clone(&self.confirm);
        let shown = request.clone();
        let approved = match tokio::task::spawn_blocking(move || confirm(&shown)).await {
            Ok(approved) => approved,
            Err(err) => {
                tracing::warn!(error = %err, "confirmation prompt failed");
                false
            }
        };
        if !approved {
            tracing::info!(account = %request.account, "signature request declined");
            return WalletApproval::Denied;
        }
        self.inner.sign_typed_data(request).await
    }
}
