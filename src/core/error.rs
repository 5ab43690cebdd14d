//! Error taxonomy shared by explorer lookups, scans and the permit relay

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad user input, rejected before any network call
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("signature request was denied by the wallet")]
    SignatureDenied,

    /// RPC or indexer failure (transport, timeout, malformed response)
    #[error("network error: {0}")]
    Network(String),

    /// Execution reverted or the receipt reported failure
    #[error("transaction reverted: {0}")]
    Revert(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The permit was included but the follow-up transfer was not
    #[error("permit {permit_tx} was mined but the transfer failed: {source}")]
    PartialFailure {
        permit_tx: String,
        #[source]
        source: Box<Error>,
    },

    /// ABI cache or relay journal I/O
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    /// Classify an adapter error: revert messages become `Revert`, the rest `Network`
    pub fn from_rpc(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if is_revert_message(&message) {
            Error::Revert(message)
        } else {
            Error::Network(message)
        }
    }

    pub fn store(err: anyhow::Error) -> Self {
        Error::Store(format!("{:#}", err))
    }

    /// Short machine-readable tag, used by the CLI and the relay journal
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::WalletUnavailable(_) => "wallet_unavailable",
            Error::SignatureDenied => "signature_denied",
            Error::Network(_) => "network",
            Error::Revert(_) => "revert",
            Error::NotFound(_) => "not_found",
            Error::PartialFailure { .. } => "partial_failure",
            Error::Store(_) => "store",
        }
    }
}

pub fn is_revert_message(message: &str) -> bool {
    message.to_lowercase().contains("revert")
}

/// Extension for mapping adapter results into the domain error
pub trait RpcResultExt<T> {
    fn map_rpc(self) -> Result<T>;
}

impl<T> RpcResultExt<T> for anyhow::Result<T> {
    fn map_rpc(self) -> Result<T> {
        self.map_err(Error::from_rpc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_classification() {
        let err = Error::from_rpc(anyhow::anyhow!("server returned: execution Reverted: ERC20Permit: invalid signature"));
        assert!(matches!(err, Error::Revert(_)));

        let err = Error::from_rpc(anyhow::anyhow!("connection refused"));
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_partial_failure_display() {
        let err = Error::PartialFailure {
            permit_tx: "0xabc".to_string(),
            source: Box::new(Error::Revert("insufficient allowance".to_string())),
        };
        assert_eq!(err.kind(), "partial_failure");
        assert!(err.to_string().contains("0xabc"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
