use scrypt::Params;

use crate::CryptoError;

/// scrypt CPU/memory cost exponent (`N = 2^SCRYPT_LOG_N`). Frozen: changing
/// this changes the derived key for every existing vault file.
pub const SCRYPT_LOG_N: u8 = 14; // N = 16384
/// scrypt block size parameter.
pub const SCRYPT_R: u32 = 8;
/// scrypt parallelization parameter.
pub const SCRYPT_P: u32 = 1;

/// Marker type documenting that the scrypt parameters above are frozen
/// across on-disk vault format versions; constructing it asserts the
/// constants still produce valid `scrypt::Params`.
pub struct ScryptParamsFrozen;

impl ScryptParamsFrozen {
    fn params() -> Params {
        Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
            .expect("frozen scrypt parameters must remain valid")
    }
}

/// Derives a 32-byte key from `raw` (the operator-supplied encryption key
/// material) and `salt` using scrypt with the frozen parameters above.
pub fn derive_key(raw: &[u8], salt: &[u8; 16]) -> Result<[u8; 32], CryptoError> {
    let params = ScryptParamsFrozen::params();
    let mut out = [0u8; 32];
    scrypt::scrypt(raw, salt, &params, &mut out)
        .map_err(|error| CryptoError::KeyDerivation(error.to_string()))?;
    Ok(out)
}
