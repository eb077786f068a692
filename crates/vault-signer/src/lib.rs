//! Ed25519-backed session token and payload signing for the vault.
//!
//! The signing keypair is bootstrapped on first use and persisted through
//! [`vault_store::Vault`] under the `signing` protocol so it survives daemon
//! restarts.

mod error;
mod signer;
mod token;

pub use error::{SignerError, TokenVerifyFailure};
pub use signer::Signer;
pub use token::VerifiedToken;
