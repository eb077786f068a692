//! Per-target OAuth2 access-token cache with single-flight refresh,
//! backed by the outbound fetch guard for the actual token endpoint call.

mod engine;
mod error;
mod types;

pub use engine::OAuthEngine;
pub use error::OAuthError;
pub use types::{CachedToken, OAuth2Credential, RefreshOutcome};
