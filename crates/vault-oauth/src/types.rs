use serde::Deserialize;

/// An in-memory cached access token for one OAuth target.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at_ms: u64,
}

/// The result of `get_access_token`: a usable token, plus a rotated refresh
/// token when the endpoint issued one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub token: String,
    pub expires_at_ms: u64,
    pub new_refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

const DEFAULT_EXPIRES_IN_SECONDS: u64 = 3600;

impl TokenEndpointResponse {
    pub fn expires_in_seconds(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECONDS)
    }
}

/// The subset of a stored `oauth2` credential the refresh engine needs.
#[derive(Debug, Clone)]
pub struct OAuth2Credential {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_endpoint: String,
    pub scope: Option<String>,
}
