use thiserror::Error;

/// Why a connection rejected a line before it ever reached a handler.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line exceeds the maximum size of {0} bytes")]
    LineTooLong(usize),
    #[error("invalid request: {0}")]
    Schema(String),
}
