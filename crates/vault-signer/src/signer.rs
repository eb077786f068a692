use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::info;
use vault_store::{Credential, Protocol, StoreOptions, Vault};

use crate::error::SignerError;
use crate::token::{build_token, parse_and_verify_token, VerifiedToken};

const SIGNING_TARGET: &str = "rpc-master";

/// Issues and verifies `v3` session tokens and prefix-bound payload
/// signatures, backed by an Ed25519 keypair that is generated on first use
/// and persisted through [`Vault`] so it survives daemon restarts.
pub struct Signer {
    vault: Arc<Vault>,
    keypair: OnceLock<(SigningKey, VerifyingKey)>,
}

impl Signer {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            keypair: OnceLock::new(),
        }
    }

    fn keypair(&self) -> Result<&(SigningKey, VerifyingKey), SignerError> {
        if let Some(keypair) = self.keypair.get() {
            return Ok(keypair);
        }
        let keypair = self.bootstrap()?;
        let _ = self.keypair.set(keypair);
        Ok(self.keypair.get().expect("keypair was just set"))
    }

    fn bootstrap(&self) -> Result<(SigningKey, VerifyingKey), SignerError> {
        match self
            .vault
            .get(Protocol::Signing, SIGNING_TARGET)
            .map_err(|error| SignerError::Bootstrap(error.to_string()))?
        {
            Some(entry) => match entry.credential {
                Credential::Ed25519 {
                    private_key,
                    public_key,
                } => decode_keypair(&private_key, &public_key),
                _ => Err(SignerError::Bootstrap(
                    "signing entry has an unexpected credential type".to_string(),
                )),
            },
            None => {
                info!("no persisted signing key found, generating one");
                let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
                let credential = Credential::Ed25519 {
                    private_key: BASE64.encode(signing_key.to_bytes()),
                    public_key: BASE64.encode(verifying_key.to_bytes()),
                };
                self.vault
                    .store(
                        Protocol::Signing,
                        SIGNING_TARGET,
                        credential,
                        StoreOptions::default(),
                    )
                    .map_err(|error| SignerError::Bootstrap(error.to_string()))?;
                Ok((signing_key, verifying_key))
            }
        }
    }

    /// Builds a `v3` session token for `scope`/`sessionId`, valid for `ttl_ms`.
    pub fn sign_token(
        &self,
        scope: &str,
        session_id: &str,
        ttl_ms: u64,
        now_unix_ms: u64,
    ) -> Result<(String, u64), SignerError> {
        if scope.is_empty() {
            return Err(SignerError::EmptyScope);
        }
        if session_id.is_empty() {
            return Err(SignerError::EmptySessionId);
        }
        if ttl_ms == 0 {
            return Err(SignerError::NonPositiveTtl);
        }
        let (signing_key, _) = self.keypair()?;
        let expires_at = now_unix_ms + ttl_ms;
        let token = build_token(signing_key, scope, session_id, now_unix_ms, expires_at);
        Ok((token, expires_at))
    }

    /// Verifies a `v3` session token, never returning parsed fields on failure.
    pub fn verify_token(&self, token: &str, now_unix_ms: u64) -> Result<VerifiedToken, SignerError> {
        let (_, verifying_key) = self.keypair()?;
        parse_and_verify_token(verifying_key, token, now_unix_ms).map_err(SignerError::from)
    }

    /// Signs `prefix || payload` with the vault's Ed25519 key.
    pub fn sign_payload(&self, payload: &[u8], prefix: &[u8]) -> Result<[u8; 64], SignerError> {
        if prefix.is_empty() {
            return Err(SignerError::EmptyPrefix);
        }
        let (signing_key, _) = self.keypair()?;
        let mut message = Vec::with_capacity(prefix.len() + payload.len());
        message.extend_from_slice(prefix);
        message.extend_from_slice(payload);
        Ok(vault_crypto::ed25519_sign(signing_key, &message))
    }

    /// Verifies a payload signature produced by [`Signer::sign_payload`].
    /// Returns `false` (never an error) for any mismatch, including a wrong
    /// `prefix`.
    pub fn verify_payload(
        &self,
        payload: &[u8],
        signature: &[u8],
        prefix: &[u8],
    ) -> Result<bool, SignerError> {
        if prefix.is_empty() {
            return Err(SignerError::EmptyPrefix);
        }
        let (_, verifying_key) = self.keypair()?;
        let mut message = Vec::with_capacity(prefix.len() + payload.len());
        message.extend_from_slice(prefix);
        message.extend_from_slice(payload);
        Ok(vault_crypto::ed25519_verify(
            verifying_key,
            &message,
            signature,
        ))
    }

    /// Returns the base64-encoded Ed25519 public key.
    pub fn public_key_base64(&self) -> Result<String, SignerError> {
        let (_, verifying_key) = self.keypair()?;
        Ok(BASE64.encode(verifying_key.to_bytes()))
    }
}

fn decode_keypair(
    private_key_b64: &str,
    public_key_b64: &str,
) -> Result<(SigningKey, VerifyingKey), SignerError> {
    let private_bytes = BASE64
        .decode(private_key_b64)
        .map_err(|error| SignerError::Bootstrap(format!("invalid persisted private key: {error}")))?;
    let public_bytes = BASE64
        .decode(public_key_b64)
        .map_err(|error| SignerError::Bootstrap(format!("invalid persisted public key: {error}")))?;
    let signing_key = vault_crypto::signing_key_from_bytes(&private_bytes)
        .map_err(|error| SignerError::Bootstrap(error.to_string()))?;
    let verifying_key = vault_crypto::verifying_key_from_bytes(&public_bytes)
        .map_err(|error| SignerError::Bootstrap(error.to_string()))?;
    Ok((signing_key, verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(dir: &tempfile::TempDir) -> Signer {
        let vault = Vault::open(dir.path().join("vault.json"), b"k".to_vec()).unwrap();
        Signer::new(Arc::new(vault))
    }

    #[test]
    fn sign_then_verify_token_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let signer = signer(&dir);
        let (token, expires_at) = signer.sign_token("tg", "s1", 60_000, 1_000).unwrap();
        let verified = signer.verify_token(&token, 1_500).unwrap();
        assert_eq!(verified.scope, "tg");
        assert_eq!(verified.expires_at, expires_at);
    }

    #[test]
    fn keypair_persists_across_signer_instances() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Arc::new(Vault::open(dir.path().join("vault.json"), b"k".to_vec()).unwrap());
        let first = Signer::new(vault.clone());
        let public_key = first.public_key_base64().unwrap();

        let second = Signer::new(vault);
        assert_eq!(second.public_key_base64().unwrap(), public_key);
    }

    #[test]
    fn sign_token_rejects_empty_scope_or_session() {
        let dir = tempfile::tempdir().unwrap();
        let signer = signer(&dir);
        assert!(signer.sign_token("", "s1", 1000, 0).is_err());
        assert!(signer.sign_token("tg", "", 1000, 0).is_err());
        assert!(signer.sign_token("tg", "s1", 0, 0).is_err());
    }

    #[test]
    fn payload_signature_is_bound_to_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let signer = signer(&dir);
        let signature = signer.sign_payload(b"payload", b"prefix-a").unwrap();
        assert!(signer
            .verify_payload(b"payload", &signature, b"prefix-a")
            .unwrap());
        assert!(!signer
            .verify_payload(b"payload", &signature, b"prefix-b")
            .unwrap());
    }

    #[test]
    fn sign_payload_rejects_empty_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let signer = signer(&dir);
        assert!(signer.sign_payload(b"payload", b"").is_err());
    }
}
