pub mod error;
pub mod store;
pub mod types;
pub mod validate;

pub use error::StoreError;
pub use store::Vault;
pub use types::{
    entry_key, Credential, CredentialEntry, EncryptedEntryRecord, EncryptedVaultFile,
    EntryMetadata, Protocol, StoreOptions,
};
pub use validate::validate_credential;
