//! Registry Error Hierarchy
//!
//! Errors are grouped by the layer that produced them: infrastructure
//! (network, storage), configuration, and registry semantics.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (network, storage, serialization)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Subscription and lease management failures
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// gRPC transport layer errors
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),

    /// Listener could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Row encoding failures
    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    /// Target context blob encoding failures
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(String),

    /// A stored row could not be decoded or references a missing parent
    #[error("Data corruption detected at {location}")]
    DataCorruption { location: String },

    /// On-disk layout written by an incompatible version
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },

    /// Topology document could not be read or parsed
    #[error("Topology document error: {0}")]
    Topology(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Watch registration rejected before anything was registered
    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    /// Lease table could not be rebuilt from the wrapped store
    #[error("Failed to restore leases: {0}")]
    LeaseRestore(String),
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        StorageError::DbError(e.to_string()).into()
    }
}

impl From<sled::transaction::TransactionError<StorageError>> for Error {
    fn from(e: sled::transaction::TransactionError<StorageError>) -> Self {
        match e {
            sled::transaction::TransactionError::Abort(e) => e.into(),
            sled::transaction::TransactionError::Storage(e) => e.into(),
        }
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(e: tonic::transport::Error) -> Self {
        NetworkError::TonicError(Box::new(e)).into()
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match e {
            Error::Registry(RegistryError::InvalidSubscription(msg)) => tonic::Status::invalid_argument(msg),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}
