use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use tracing::{info, warn};
use vault_core::write_bytes_atomic;

use crate::error::StoreError;
use crate::types::{
    entry_key, Credential, CredentialEntry, EncryptedEntryRecord, EncryptedVaultFile,
    EntryMetadata, Protocol, StoreOptions,
};
use crate::validate::validate_credential;

const VAULT_FILE_MODE: u32 = 0o600;
const VAULT_DIR_MODE: u32 = 0o700;
const SALT_LEN: usize = 16;

/// File-backed, authenticated-encrypted credential store.
///
/// `store`/`delete` are serialized by `write_mutex` (read-modify-write);
/// `get`/`list`/`has` read the file directly and tolerate a racing atomic
/// rename — they simply observe whichever complete version was on disk when
/// they opened it.
pub struct Vault {
    path: PathBuf,
    raw_key: Vec<u8>,
    write_mutex: Mutex<()>,
    derived_keys: Mutex<HashMap<String, [u8; 32]>>,
}

impl Vault {
    /// Opens (without yet creating) the vault at `path`, keyed by `raw_key`
    /// (the operator-supplied `VAULT_ENCRYPTION_KEY`). The file and its
    /// parent directory are created lazily, on first `store`.
    pub fn open(path: impl Into<PathBuf>, raw_key: impl Into<Vec<u8>>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            vault_core::ensure_dir_mode(parent, VAULT_DIR_MODE)?;
        }
        Ok(Self {
            path,
            raw_key: raw_key.into(),
            write_mutex: Mutex::new(()),
            derived_keys: Mutex::new(HashMap::new()),
        })
    }

    /// Derives (or returns the cached derivation of) the AES key for
    /// `salt_b64`. Cached per-salt rather than on first call only — the
    /// vault file's salt is not fixed until it is actually persisted, so a
    /// `get`/`list`/`has` against a not-yet-created file and a later
    /// `store` that creates it can legitimately see different transient
    /// salts; caching by salt value (instead of unconditionally on first
    /// use) keeps the key that's ever used to encrypt an entry in sync
    /// with the salt recorded alongside it on disk.
    fn derive_key(&self, salt_b64: &str) -> Result<[u8; 32], StoreError> {
        let mut cache = self.derived_keys.lock().expect("derived key cache mutex poisoned");
        if let Some(key) = cache.get(salt_b64) {
            return Ok(*key);
        }
        let salt_bytes = BASE64
            .decode(salt_b64)
            .map_err(|e| StoreError::Corrupted(format!("invalid salt encoding: {e}")))?;
        let salt: [u8; SALT_LEN] = salt_bytes
            .try_into()
            .map_err(|_| StoreError::Corrupted("salt is not 16 bytes".to_string()))?;
        let key = vault_crypto::derive_key(&self.raw_key, &salt)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        cache.insert(salt_b64.to_string(), key);
        Ok(key)
    }

    /// Loads the on-disk file, quarantining it on whole-file corruption and
    /// starting fresh. Assigns a new random salt only when the file did not
    /// exist yet — the salt is written exactly once per vault.
    fn load_or_recover(&self) -> Result<EncryptedVaultFile, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<EncryptedVaultFile>(&bytes) {
                Ok(file) if file.version == 1 => Ok(file),
                Ok(file) => {
                    self.quarantine(&format!("unsupported vault version {}", file.version))?;
                    Ok(self.new_vault_file())
                }
                Err(error) => {
                    self.quarantine(&format!("failed to parse vault file: {error}"))?;
                    Ok(self.new_vault_file())
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(self.new_vault_file()),
            Err(error) => Err(StoreError::Io(error.to_string())),
        }
    }

    fn new_vault_file(&self) -> EncryptedVaultFile {
        let salt = vault_crypto::random_bytes(SALT_LEN);
        EncryptedVaultFile::new(BASE64.encode(salt))
    }

    fn quarantine(&self, reason: &str) -> Result<(), StoreError> {
        let now_ms = vault_core::current_unix_timestamp_ms();
        let quarantine_path = PathBuf::from(format!("{}.corrupted.{now_ms}", self.path.display()));
        tracing::error!(reason, quarantine_path = %quarantine_path.display(), "vault file corrupted, quarantining");
        std::fs::rename(&self.path, &quarantine_path).map_err(|error| {
            StoreError::Corrupted(format!(
                "failed to quarantine corrupted vault file ({reason}): {error}"
            ))
        })
    }

    fn persist(&self, file: &EncryptedVaultFile) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(file)
            .map_err(|e| StoreError::Io(format!("failed to encode vault file: {e}")))?;
        write_bytes_atomic(&self.path, &json, VAULT_FILE_MODE)
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    fn decrypt_entry(&self, key: &[u8; 32], record: &EncryptedEntryRecord) -> Result<CredentialEntry, StoreError> {
        let iv = BASE64
            .decode(&record.iv)
            .map_err(|_| StoreError::DecryptFailure)?;
        let data = BASE64
            .decode(&record.data)
            .map_err(|_| StoreError::DecryptFailure)?;
        let tag = BASE64
            .decode(&record.tag)
            .map_err(|_| StoreError::DecryptFailure)?;
        let iv: [u8; 12] = iv.try_into().map_err(|_| StoreError::DecryptFailure)?;
        let tag: [u8; 16] = tag.try_into().map_err(|_| StoreError::DecryptFailure)?;
        let record = vault_crypto::EncryptedRecord {
            iv,
            ciphertext: data,
            tag,
        };
        let plaintext = vault_crypto::decrypt(&record, key).map_err(|_| StoreError::DecryptFailure)?;
        serde_json::from_slice(&plaintext).map_err(|_| StoreError::DecryptFailure)
    }

    fn encrypt_entry(&self, key: &[u8; 32], entry: &CredentialEntry) -> Result<EncryptedEntryRecord, StoreError> {
        let plaintext = serde_json::to_vec(entry)
            .map_err(|e| StoreError::Io(format!("failed to encode entry: {e}")))?;
        let record = vault_crypto::encrypt(&plaintext, key);
        Ok(EncryptedEntryRecord {
            iv: BASE64.encode(record.iv),
            data: BASE64.encode(record.ciphertext),
            tag: BASE64.encode(record.tag),
        })
    }

    /// Writes or overwrites the entry for `(protocol, target)`.
    pub fn store(
        &self,
        protocol: Protocol,
        target: &str,
        credential: Credential,
        opts: StoreOptions,
    ) -> Result<(), StoreError> {
        validate_credential(&credential)?;
        let _guard = self.write_mutex.lock().expect("vault write mutex poisoned");

        let mut file = self.load_or_recover()?;
        let key = self.derive_key(&file.salt)?;

        let entry = CredentialEntry {
            protocol,
            target: target.to_string(),
            label: opts.label,
            credential,
            allowed_paths: opts.allowed_paths,
            rate_limit_per_minute: opts.rate_limit_per_minute,
            created_at: Utc::now().to_rfc3339(),
            expires_at: opts.expires_at,
        };
        let record = self.encrypt_entry(&key, &entry)?;
        file.entries.insert(entry_key(protocol, target), record);
        self.persist(&file)?;
        info!(protocol = protocol.as_str(), target, "stored vault entry");
        Ok(())
    }

    /// Returns the decrypted entry for `(protocol, target)`, or `None` if
    /// absent, undecryptable, or expired. Expired entries are not deleted —
    /// `list` may still surface their metadata.
    pub fn get(&self, protocol: Protocol, target: &str) -> Result<Option<CredentialEntry>, StoreError> {
        let file = self.load_or_recover()?;
        let Some(record) = file.entries.get(&entry_key(protocol, target)) else {
            return Ok(None);
        };
        let key = self.derive_key(&file.salt)?;
        let entry = match self.decrypt_entry(&key, record) {
            Ok(entry) => entry,
            Err(_) => {
                warn!(protocol = protocol.as_str(), target, "entry failed to decrypt, treating as absent");
                return Ok(None);
            }
        };
        if is_expired(&entry) {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Removes the entry for `(protocol, target)` if present.
    pub fn delete(&self, protocol: Protocol, target: &str) -> Result<bool, StoreError> {
        let _guard = self.write_mutex.lock().expect("vault write mutex poisoned");
        let mut file = self.load_or_recover()?;
        let removed = file.entries.remove(&entry_key(protocol, target)).is_some();
        if removed {
            self.persist(&file)?;
            info!(protocol = protocol.as_str(), target, "deleted vault entry");
        }
        Ok(removed)
    }

    /// Presence check without decrypting.
    pub fn has(&self, protocol: Protocol, target: &str) -> Result<bool, StoreError> {
        let file = self.load_or_recover()?;
        Ok(file.entries.contains_key(&entry_key(protocol, target)))
    }

    /// Lists metadata for all entries, optionally filtered by protocol.
    /// Entries that fail to decrypt are skipped with a warning and never
    /// exposed; no secret material is ever included in the result.
    pub fn list(&self, filter: Option<Protocol>) -> Result<Vec<EntryMetadata>, StoreError> {
        let file = self.load_or_recover()?;
        let key = self.derive_key(&file.salt)?;
        let mut out = Vec::new();
        for (key_str, record) in &file.entries {
            let entry = match self.decrypt_entry(&key, record) {
                Ok(entry) => entry,
                Err(_) => {
                    warn!(entry = key_str, "skipping entry that failed to decrypt during list");
                    continue;
                }
            };
            if let Some(filter) = filter {
                if entry.protocol != filter {
                    continue;
                }
            }
            out.push(EntryMetadata {
                protocol: entry.protocol,
                target: entry.target,
                label: entry.label,
                credential_type: entry.credential.type_name().to_string(),
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            });
        }
        Ok(out)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_expired(entry: &CredentialEntry) -> bool {
    let Some(expires_at) = &entry.expires_at else {
        return false;
    };
    match chrono::DateTime::parse_from_rfc3339(expires_at) {
        Ok(expires_at) => expires_at < Utc::now(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault(dir: &tempfile::TempDir) -> Vault {
        Vault::open(dir.path().join("vault.json"), b"operator-secret".to_vec()).expect("open")
    }

    #[test]
    fn store_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault
            .store(
                Protocol::Http,
                "api.x.test",
                Credential::Bearer { token: "T".into() },
                StoreOptions::default(),
            )
            .expect("store");

        let entry = vault
            .get(Protocol::Http, "api.x.test")
            .expect("get")
            .expect("present");
        assert_eq!(entry.protocol, Protocol::Http);
        assert_eq!(entry.target, "api.x.test");
        assert_eq!(entry.credential, Credential::Bearer { token: "T".into() });
    }

    #[test]
    fn get_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        assert!(vault.get(Protocol::Ssh, "nope").unwrap().is_none());
    }

    #[test]
    fn get_expired_entry_returns_none_but_list_still_shows_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        let mut opts = StoreOptions::default();
        opts.expires_at = Some("2000-01-01T00:00:00Z".to_string());
        vault
            .store(
                Protocol::Http,
                "expired.test",
                Credential::Bearer { token: "T".into() },
                opts,
            )
            .unwrap();

        assert!(vault.get(Protocol::Http, "expired.test").unwrap().is_none());
        let listed = vault.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].target, "expired.test");
    }

    #[test]
    fn delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault
            .store(
                Protocol::Secret,
                "s1",
                Credential::Opaque { value: "v".into() },
                StoreOptions::default(),
            )
            .unwrap();
        assert!(vault.delete(Protocol::Secret, "s1").unwrap());
        assert!(!vault.delete(Protocol::Secret, "s1").unwrap());
        assert!(vault.get(Protocol::Secret, "s1").unwrap().is_none());
    }

    #[test]
    fn list_never_leaks_secret_material() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault
            .store(
                Protocol::Http,
                "leak-check",
                Credential::Basic {
                    username: "u".into(),
                    password: "super-secret-password".into(),
                },
                StoreOptions::default(),
            )
            .unwrap();
        let listed = vault.list(None).unwrap();
        let serialized = serde_json::to_string(&listed).unwrap();
        assert!(!serialized.contains("super-secret-password"));
    }

    #[test]
    fn decrypt_failure_under_wrong_key_is_skipped_in_list_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path().join("vault.json"), b"right-key".to_vec()).unwrap();
        vault
            .store(
                Protocol::Http,
                "a",
                Credential::Bearer { token: "T".into() },
                StoreOptions::default(),
            )
            .unwrap();

        let wrong_key_vault =
            Vault::open(dir.path().join("vault.json"), b"wrong-key".to_vec()).unwrap();
        assert!(wrong_key_vault.list(None).unwrap().is_empty());
        assert!(wrong_key_vault
            .get(Protocol::Http, "a")
            .unwrap()
            .is_none());
    }

    #[test]
    fn get_before_store_on_fresh_file_then_reopen_still_decrypts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let vault = Vault::open(&path, b"operator-secret".to_vec()).unwrap();
        // Mirrors Signer::bootstrap(): a get() against a not-yet-created
        // file runs first, deriving a key from a transient salt that must
        // not be pinned for the store() that actually creates the file.
        assert!(vault.get(Protocol::Signing, "rpc-master").unwrap().is_none());
        vault
            .store(
                Protocol::Signing,
                "rpc-master",
                Credential::Ed25519 {
                    private_key: "cHJpdg==".into(),
                    public_key: "cHViCg==".into(),
                },
                StoreOptions::default(),
            )
            .unwrap();

        let reopened = Vault::open(&path, b"operator-secret".to_vec()).unwrap();
        let entry = reopened
            .get(Protocol::Signing, "rpc-master")
            .expect("get")
            .expect("entry persisted under the salt actually used to encrypt it");
        assert_eq!(
            entry.credential,
            Credential::Ed25519 {
                private_key: "cHJpdg==".into(),
                public_key: "cHViCg==".into(),
            }
        );
    }

    #[test]
    fn has_does_not_decrypt() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        assert!(!vault.has(Protocol::Http, "x").unwrap());
        vault
            .store(
                Protocol::Http,
                "x",
                Credential::Bearer { token: "T".into() },
                StoreOptions::default(),
            )
            .unwrap();
        assert!(vault.has(Protocol::Http, "x").unwrap());
    }

    #[test]
    fn list_filters_by_protocol() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault
            .store(
                Protocol::Http,
                "h1",
                Credential::Bearer { token: "T".into() },
                StoreOptions::default(),
            )
            .unwrap();
        vault
            .store(
                Protocol::Ssh,
                "s1",
                Credential::SshPassword {
                    username: "u".into(),
                    password: "p".into(),
                },
                StoreOptions::default(),
            )
            .unwrap();
        let only_http = vault.list(Some(Protocol::Http)).unwrap();
        assert_eq!(only_http.len(), 1);
        assert_eq!(only_http[0].protocol, Protocol::Http);
    }

    #[test]
    fn invalid_credential_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        let result = vault.store(
            Protocol::Http,
            "bad",
            Credential::ApiKey {
                token: "t".into(),
                header: "not a token".into(),
            },
            StoreOptions::default(),
        );
        assert!(result.is_err());
        assert!(!vault.path().exists());
    }

    #[test]
    fn corrupted_vault_file_is_quarantined_and_store_continues_with_empty_vault() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, b"not json at all").unwrap();
        let vault = Vault::open(&path, b"k".to_vec()).unwrap();

        assert!(vault.list(None).unwrap().is_empty());

        let corrupted_siblings: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupted."))
            .collect();
        assert_eq!(corrupted_siblings.len(), 1);
    }
}
