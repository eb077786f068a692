use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};

use crate::error::TokenVerifyFailure;

const TOKEN_VERSION: &str = "v3";
const TOKEN_FIELD_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub scope: String,
    pub session_id: String,
    pub created_at: u64,
    pub expires_at: u64,
}

fn signed_message(scope: &str, session_id: &str, created_at: u64, expires_at: u64) -> String {
    format!("{TOKEN_VERSION}:{scope}:{session_id}:{created_at}:{expires_at}")
}

/// Builds a `v3` session token: `v3:<scope>:<sessionId>:<createdAt>:<expiresAt>:<sig>`.
pub fn build_token(
    signing_key: &SigningKey,
    scope: &str,
    session_id: &str,
    created_at: u64,
    expires_at: u64,
) -> String {
    let message = signed_message(scope, session_id, created_at, expires_at);
    let signature = vault_crypto::ed25519_sign(signing_key, message.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);
    format!("{message}:{sig_b64}")
}

/// Parses and verifies a `v3` session token against `verifying_key`. Never
/// returns parsed fields on failure — only the rejection category.
pub fn parse_and_verify_token(
    verifying_key: &VerifyingKey,
    token: &str,
    now_unix_ms: u64,
) -> Result<VerifiedToken, TokenVerifyFailure> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() != TOKEN_FIELD_COUNT {
        return Err(TokenVerifyFailure::Format);
    }
    let [version, scope, session_id, created_at, expires_at, sig_b64] = parts[..] else {
        return Err(TokenVerifyFailure::Format);
    };
    if version != TOKEN_VERSION {
        return Err(TokenVerifyFailure::Version);
    }
    if scope.is_empty() || session_id.is_empty() {
        return Err(TokenVerifyFailure::Fields);
    }
    let created_at: u64 = created_at.parse().map_err(|_| TokenVerifyFailure::Fields)?;
    let expires_at: u64 = expires_at.parse().map_err(|_| TokenVerifyFailure::Fields)?;

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| TokenVerifyFailure::Format)?;
    let message = signed_message(scope, session_id, created_at, expires_at);
    if !vault_crypto::ed25519_verify(verifying_key, message.as_bytes(), &signature) {
        return Err(TokenVerifyFailure::Signature);
    }
    if expires_at <= now_unix_ms {
        return Err(TokenVerifyFailure::Expired);
    }
    Ok(VerifiedToken {
        scope: scope.to_string(),
        session_id: session_id.to_string(),
        created_at,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_verify_round_trips() {
        let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
        let token = build_token(&signing_key, "tg", "s1", 1_000, 61_000);
        let verified = parse_and_verify_token(&verifying_key, &token, 1_500).expect("ok");
        assert_eq!(verified.scope, "tg");
        assert_eq!(verified.session_id, "s1");
        assert_eq!(verified.created_at, 1_000);
        assert_eq!(verified.expires_at, 61_000);
    }

    #[test]
    fn expired_token_is_rejected() {
        let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
        let token = build_token(&signing_key, "tg", "s1", 1_000, 2_000);
        let result = parse_and_verify_token(&verifying_key, &token, 2_000);
        assert_eq!(result.unwrap_err(), TokenVerifyFailure::Expired);
    }

    #[test]
    fn wrong_field_count_is_format_error() {
        let (_, verifying_key) = vault_crypto::ed25519_generate();
        let result = parse_and_verify_token(&verifying_key, "v3:only:three:parts", 0);
        assert_eq!(result.unwrap_err(), TokenVerifyFailure::Format);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
        let token = build_token(&signing_key, "tg", "s1", 1_000, 61_000);
        let tampered = token.replacen("v3", "v4", 1);
        let result = parse_and_verify_token(&verifying_key, &tampered, 1_500);
        assert_eq!(result.unwrap_err(), TokenVerifyFailure::Version);
    }

    #[test]
    fn any_bit_flip_in_the_token_fails_verification() {
        let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
        let token = build_token(&signing_key, "tg", "s1", 1_000, 61_000);

        let mut tampered_scope = token.clone();
        tampered_scope = tampered_scope.replacen(":tg:", ":th:", 1);
        assert!(parse_and_verify_token(&verifying_key, &tampered_scope, 1_500).is_err());

        let mut bytes = token.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered_sig = String::from_utf8(bytes).unwrap();
        assert_eq!(
            parse_and_verify_token(&verifying_key, &tampered_sig, 1_500).unwrap_err(),
            TokenVerifyFailure::Signature
        );
    }

    #[test]
    fn wrong_signing_key_is_rejected() {
        let (signing_key, _) = vault_crypto::ed25519_generate();
        let (_, other_verifying_key) = vault_crypto::ed25519_generate();
        let token = build_token(&signing_key, "tg", "s1", 1_000, 61_000);
        let result = parse_and_verify_token(&other_verifying_key, &token, 1_500);
        assert_eq!(result.unwrap_err(), TokenVerifyFailure::Signature);
    }
}
