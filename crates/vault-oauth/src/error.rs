use thiserror::Error;

/// Errors surfaced by [`crate::OAuthEngine::get_access_token`]. Messages are
/// always pre-sanitized: any embedded URL has been replaced with
/// `[URL REDACTED]` before the error reaches this type.
#[derive(Debug, Clone, Error)]
pub enum OAuthError {
    #[error("token endpoint request failed: {0}")]
    Refresh(String),
    #[error("token endpoint response was malformed: {0}")]
    MalformedResponse(String),
}
