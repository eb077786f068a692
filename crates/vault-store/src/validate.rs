use crate::error::StoreError;
use crate::types::Credential;

/// RFC 7230 `tchar` set: `"!#$%&'*+-.^_`|~" ++ DIGIT ++ ALPHA`.
fn is_rfc7230_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_rfc7230_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_rfc7230_tchar)
}

fn is_param_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn require_non_empty(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Validates a credential against its variant-specific constraints from
/// spec.md §3. Called by `store` before anything is encrypted or persisted.
pub fn validate_credential(credential: &Credential) -> Result<(), StoreError> {
    match credential {
        Credential::Bearer { token } => require_non_empty("token", token),
        Credential::ApiKey { token, header } => {
            require_non_empty("token", token)?;
            if !is_rfc7230_token(header) {
                return Err(StoreError::Validation(format!(
                    "api-key header '{header}' is not a valid RFC 7230 token"
                )));
            }
            Ok(())
        }
        Credential::Basic { username, password } => {
            require_non_empty("username", username)?;
            require_non_empty("password", password)
        }
        Credential::Query { token, param } => {
            require_non_empty("token", token)?;
            if !is_param_name(param) {
                return Err(StoreError::Validation(format!(
                    "query param '{param}' must match [A-Za-z0-9_-]+"
                )));
            }
            Ok(())
        }
        Credential::OAuth2 {
            client_id,
            client_secret,
            refresh_token,
            token_endpoint,
            ..
        } => {
            require_non_empty("clientId", client_id)?;
            require_non_empty("clientSecret", client_secret)?;
            require_non_empty("refreshToken", refresh_token)?;
            if !token_endpoint.starts_with("https://") {
                return Err(StoreError::Validation(format!(
                    "oauth2 tokenEndpoint '{token_endpoint}' must start with https://"
                )));
            }
            Ok(())
        }
        Credential::Db {
            username, password, ..
        } => {
            require_non_empty("username", username)?;
            require_non_empty("password", password)
        }
        Credential::SshKey {
            username,
            private_key,
            ..
        } => {
            require_non_empty("username", username)?;
            require_non_empty("privateKey", private_key)
        }
        Credential::SshPassword { username, password } => {
            require_non_empty("username", username)?;
            require_non_empty("password", password)
        }
        Credential::Ed25519 {
            private_key,
            public_key,
        } => {
            require_non_empty("privateKey", private_key)?;
            require_non_empty("publicKey", public_key)
        }
        Credential::Opaque { value } => require_non_empty("value", value),
    }
}
