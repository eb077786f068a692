use thiserror::Error;

/// Errors surfaced by [`crate::Signer`] construction and payload signing.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing key bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("prefix must not be empty")]
    EmptyPrefix,
    #[error("scope must not be empty")]
    EmptyScope,
    #[error("sessionId must not be empty")]
    EmptySessionId,
    #[error("ttlMs must be greater than zero")]
    NonPositiveTtl,
    #[error("token rejected: {0}")]
    Verify(#[from] TokenVerifyFailure),
}

/// Why `verify_token` rejected a token. Never carries parsed fields — only
/// the caller-facing category named in spec.md §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenVerifyFailure {
    Format,
    Version,
    Fields,
    Expired,
    Signature,
}

impl TokenVerifyFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Version => "version",
            Self::Fields => "fields",
            Self::Expired => "expired",
            Self::Signature => "signature",
        }
    }
}

impl std::fmt::Display for TokenVerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for TokenVerifyFailure {}
