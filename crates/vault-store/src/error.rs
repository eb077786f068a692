use thiserror::Error;

/// Errors surfaced by [`crate::Vault`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("entry decryption failed")]
    DecryptFailure,
    #[error("io error: {0}")]
    Io(String),
    #[error("vault file is corrupted: {0}")]
    Corrupted(String),
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        StoreError::Io(error.to_string())
    }
}
