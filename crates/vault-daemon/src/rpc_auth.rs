use ed25519_dalek::VerifyingKey;

/// Builds the canonical `v2` signed payload for the relay↔agent RPC:
/// `v2\n<scope>\n<timestamp>\n<nonce>\n<METHOD>\n<path>\n<body>`.
///
/// The scope binding, skew window, and nonce replay map belong to the RPC
/// layer itself (an external collaborator); this crate exposes only the
/// canonical message construction and the Ed25519 primitive it is verified
/// against.
pub fn canonical_message(
    scope: &str,
    timestamp_ms: u64,
    nonce: &str,
    method: &str,
    path: &str,
    body: &[u8],
) -> Vec<u8> {
    let mut message = format!("v2\n{scope}\n{timestamp_ms}\n{nonce}\n{method}\n{path}\n").into_bytes();
    message.extend_from_slice(body);
    message
}

/// Verifies a `canonical_message` signature under `verifying_key`. Does not
/// check timestamp skew, nonce replay, or auth-type — those live in the RPC
/// layer that calls this.
pub fn verify_rpc_signature(verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> bool {
    vault_crypto::ed25519_verify(verifying_key, message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_over_canonical_message_verifies() {
        let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
        let message = canonical_message("tg", 1_000, "n1", "GET", "/v1/x", b"");
        let signature = vault_crypto::ed25519_sign(&signing_key, &message);
        assert!(verify_rpc_signature(&verifying_key, &message, &signature));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let (signing_key, verifying_key) = vault_crypto::ed25519_generate();
        let message = canonical_message("tg", 1_000, "n1", "POST", "/v1/x", b"original");
        let signature = vault_crypto::ed25519_sign(&signing_key, &message);
        let tampered = canonical_message("tg", 1_000, "n1", "POST", "/v1/x", b"tampered");
        assert!(!verify_rpc_signature(&verifying_key, &tampered, &signature));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let (signing_key, _verifying_key) = vault_crypto::ed25519_generate();
        let (_other_signing_key, other_verifying_key) = vault_crypto::ed25519_generate();
        let message = canonical_message("tg", 1_000, "n1", "GET", "/v1/x", b"");
        let signature = vault_crypto::ed25519_sign(&signing_key, &message);
        assert!(!verify_rpc_signature(&other_verifying_key, &message, &signature));
    }
}
