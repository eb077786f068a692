use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::CryptoError;

/// Generates a fresh Ed25519 keypair from the OS CSPRNG.
pub fn ed25519_generate() -> (SigningKey, VerifyingKey) {
    let mut csprng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let verifying_key = signing_key.verifying_key();
    (signing_key, verifying_key)
}

/// Signs `message` with `key`, returning the raw 64-byte signature.
pub fn ed25519_sign(key: &SigningKey, message: &[u8]) -> [u8; 64] {
    key.sign(message).to_bytes()
}

/// Verifies `signature` over `message` under `verifying_key`. Returns `false`
/// on any malformed-signature or mismatch condition rather than erroring —
/// callers treat "not verified" uniformly regardless of the reason.
pub fn ed25519_verify(verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> bool {
    let Ok(sig_bytes): Result<[u8; 64], _> = signature.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}

/// Decodes a 32-byte Ed25519 verifying key.
pub fn verifying_key_from_bytes(bytes: &[u8]) -> Result<VerifyingKey, CryptoError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::MalformedKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&array)
        .map_err(|error| CryptoError::MalformedKey(error.to_string()))
}

/// Decodes a 32-byte Ed25519 signing key.
pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, CryptoError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::MalformedKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    Ok(SigningKey::from_bytes(&array))
}
