use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::{random_bytes, CryptoError};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// One AES-256-GCM authenticated-encryption output: a fresh random IV, the
/// ciphertext (tag-appended, as the `aead` crate returns it), and the tag
/// split out separately so the on-disk shape matches spec.md's
/// `{iv, data, tag}` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

/// Encrypts `plaintext` under `key` with a fresh random 96-bit IV.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> EncryptedRecord {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let iv_bytes = random_bytes(IV_LEN);
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&iv_bytes);
    let nonce = Nonce::from_slice(&iv);

    // aes-gcm appends the 16-byte tag to the ciphertext; split it back out so
    // the caller can persist `{iv, ciphertext, tag}` independently.
    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .expect("AES-256-GCM encryption of in-memory plaintext cannot fail");
    let tag_start = sealed.len() - TAG_LEN;
    let tag_slice = sealed.split_off(tag_start);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_slice);

    EncryptedRecord {
        iv,
        ciphertext: sealed,
        tag,
    }
}

/// Decrypts `record` under `key`. Any tampering with `iv`, `ciphertext`, or
/// `tag` causes this to return [`CryptoError::AuthenticationFailed`] — never
/// a partially-decrypted or unauthenticated result.
pub fn decrypt(record: &EncryptedRecord, key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&record.iv);

    let mut sealed = Vec::with_capacity(record.ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(&record.ciphertext);
    sealed.extend_from_slice(&record.tag);

    cipher
        .decrypt(nonce, sealed.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        let mut k = [0u8; 32];
        k.copy_from_slice(&crate::random_bytes(32));
        k
    }

    #[test]
    fn round_trip_recovers_plaintext() {
        let k = key();
        let record = encrypt(b"hello vault", &k);
        let plaintext = decrypt(&record, &k).expect("decrypt should succeed");
        assert_eq!(plaintext, b"hello vault");
    }

    #[test]
    fn flipping_any_byte_of_iv_ciphertext_or_tag_fails_decryption() {
        let k = key();
        let record = encrypt(b"credential material", &k);

        let mut bad_iv = record.clone();
        bad_iv.iv[0] ^= 0xFF;
        assert!(decrypt(&bad_iv, &k).is_err());

        let mut bad_ct = record.clone();
        if let Some(byte) = bad_ct.ciphertext.first_mut() {
            *byte ^= 0xFF;
        }
        assert!(decrypt(&bad_ct, &k).is_err());

        let mut bad_tag = record.clone();
        bad_tag.tag[0] ^= 0xFF;
        assert!(decrypt(&bad_tag, &k).is_err());
    }

    #[test]
    fn decrypt_under_wrong_key_fails() {
        let k1 = key();
        let k2 = key();
        let record = encrypt(b"secret", &k1);
        assert!(decrypt(&record, &k2).is_err());
    }

    #[test]
    fn two_encryptions_of_same_plaintext_use_different_ivs() {
        let k = key();
        let a = encrypt(b"same plaintext", &k);
        let b = encrypt(b"same plaintext", &k);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
