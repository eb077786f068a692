//! Cryptographic primitives for the credential vault: AES-256-GCM
//! authenticated encryption, scrypt key derivation, Ed25519 signing, and a
//! CSPRNG source. No function here panics on malformed input; every
//! failure is surfaced as a [`CryptoError`].

mod aead;
mod kdf;
mod signing;

pub use aead::{decrypt, encrypt, EncryptedRecord};
pub use kdf::{derive_key, ScryptParamsFrozen, SCRYPT_LOG_N, SCRYPT_P, SCRYPT_R};
pub use signing::{
    ed25519_generate, ed25519_sign, ed25519_verify, signing_key_from_bytes,
    verifying_key_from_bytes,
};

use thiserror::Error;

/// Errors surfaced by all cryptographic operations in this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("authenticated decryption failed")]
    AuthenticationFailed,
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("malformed key material: {0}")]
    MalformedKey(String),
    #[error("malformed signature")]
    MalformedSignature,
}

/// Fills `buf` with cryptographically secure random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut buf = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}
