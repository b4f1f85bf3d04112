use thiserror::Error;

/// Protocol-level errors raised by the handshake core.
///
/// These are distinct from transport errors: a `Transport` impl reports its
/// own failures (connection drop, timeout) through its own error type and
/// never surfaces them through `CoreError`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("algorithm not supported: {0}")]
    AlgorithmUnsupported(String),

    #[error("algorithm mismatch between request and response for chat {chat_uuid}")]
    AlgorithmMismatch { chat_uuid: String },

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("KEM decapsulation failed: {0}")]
    DecapsulationFailed(String),

    #[error("signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("handshake desynchronized for chat {chat_uuid}: no pending secret")]
    HandshakeDesynchronized { chat_uuid: String },

    #[error("persistent store failure: {0}")]
    StoreFailure(String),

    #[error("malformed handshake message: {0}")]
    MalformedMessage(String),
}

impl From<redb::Error> for CoreError {
    fn from(err: redb::Error) -> Self {
        CoreError::StoreFailure(err.to_string())
    }
}

impl From<redb::TransactionError> for CoreError {
    fn from(err: redb::TransactionError) -> Self {
        CoreError::StoreFailure(err.to_string())
    }
}

impl From<redb::TableError> for CoreError {
    fn from(err: redb::TableError) -> Self {
        CoreError::StoreFailure(err.to_string())
    }
}

impl From<redb::StorageError> for CoreError {
    fn from(err: redb::StorageError) -> Self {
        CoreError::StoreFailure(err.to_string())
    }
}

impl From<redb::CommitError> for CoreError {
    fn from(err: redb::CommitError) -> Self {
        CoreError::StoreFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
