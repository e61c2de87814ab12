use thiserror::Error;

pub type Result<T> = std::result::Result<T, PactError>;

#[derive(Error, Debug)]
pub enum PactError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Resolution error: {0}")]
    ResolutionError(String),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("Transaction {signature} failed on-chain: {reason}")]
    TransactionFailed { signature: String, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Duplicate reference key: {0}")]
    DuplicateReference(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Notification error: {0}")]
    NotificationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl PactError {
    /// Whether rebuilding and resubmitting the transaction may succeed.
    ///
    /// Nothing in this crate retries on its own; callers decide.
    pub fn is_retriable(&self) -> bool {
        match self {
            PactError::Network(e) => e.is_retriable(),
            _ => false,
        }
    }
}

/// Failures raised while asking a wallet to sign or submit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("User rejected the request: {0}")]
    UserRejected(String),
    #[error("Wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("RPC unreachable: {0}")]
    Unreachable(String),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error(
        "Blockhash expired: block height {current_block_height} exceeded last valid height {last_valid_block_height}"
    )]
    BlockhashExpired {
        last_valid_block_height: u64,
        current_block_height: u64,
    },
    /// Polling kept failing after the transaction was broadcast, so it may
    /// still land. Reconcile before paying again.
    #[error("Outcome of transaction {signature} unknown after {waited_secs}s without an RPC answer")]
    ConfirmationUnknown { signature: String, waited_secs: u64 },
}

impl NetworkError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            NetworkError::Unreachable(_) | NetworkError::BlockhashExpired { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        let expired = PactError::from(NetworkError::BlockhashExpired {
            last_valid_block_height: 10,
            current_block_height: 11,
        });
        assert!(expired.is_retriable());
        assert!(PactError::from(NetworkError::Unreachable("down".into())).is_retriable());

        let rpc = PactError::from(NetworkError::Rpc {
            code: -32602,
            message: "invalid params".into(),
        });
        assert!(!rpc.is_retriable());
        assert!(!PactError::from(SignerError::UserRejected("no".into())).is_retriable());
        assert!(!PactError::ValidationError("bad".into()).is_retriable());

        let unknown = PactError::from(NetworkError::ConfirmationUnknown {
            signature: "sig".into(),
            waited_secs: 120,
        });
        assert!(!unknown.is_retriable());
    }
}
