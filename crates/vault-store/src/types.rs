use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The closed set of protocols a vault entry may be keyed under.
pub enum Protocol {
    Http,
    Postgres,
    Mysql,
    Ssh,
    Secret,
    Signing,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Ssh => "ssh",
            Self::Secret => "secret",
            Self::Signing => "signing",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Self::Http),
            "postgres" => Some(Self::Postgres),
            "mysql" => Some(Self::Mysql),
            "ssh" => Some(Self::Ssh),
            "secret" => Some(Self::Secret),
            "signing" => Some(Self::Signing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders the `(protocol, target)` identity key as `"<protocol>:<target>"`.
pub fn entry_key(protocol: Protocol, target: &str) -> String {
    format!("{}:{}", protocol.as_str(), target)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
/// Tagged credential variant. Each arm is the constructor surface that must
/// pass [`crate::validate::validate_credential`] before it is stored.
pub enum Credential {
    #[serde(rename = "bearer")]
    Bearer { token: String },
    #[serde(rename = "api-key")]
    ApiKey { token: String, header: String },
    #[serde(rename = "basic")]
    Basic { username: String, password: String },
    #[serde(rename = "query")]
    Query { token: String, param: String },
    #[serde(rename = "oauth2")]
    OAuth2 {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "clientSecret")]
        client_secret: String,
        #[serde(rename = "refreshToken")]
        refresh_token: String,
        #[serde(rename = "tokenEndpoint")]
        token_endpoint: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
    #[serde(rename = "db")]
    Db {
        username: String,
        password: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        database: Option<String>,
    },
    #[serde(rename = "ssh-key")]
    SshKey {
        username: String,
        #[serde(rename = "privateKey")]
        private_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        passphrase: Option<String>,
    },
    #[serde(rename = "ssh-password")]
    SshPassword { username: String, password: String },
    #[serde(rename = "ed25519")]
    Ed25519 {
        #[serde(rename = "privateKey")]
        private_key: String,
        #[serde(rename = "publicKey")]
        public_key: String,
    },
    #[serde(rename = "opaque")]
    Opaque { value: String },
}

impl Credential {
    /// Stable discriminant string, as persisted/reported by `list`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bearer { .. } => "bearer",
            Self::ApiKey { .. } => "api-key",
            Self::Basic { .. } => "basic",
            Self::Query { .. } => "query",
            Self::OAuth2 { .. } => "oauth2",
            Self::Db { .. } => "db",
            Self::SshKey { .. } => "ssh-key",
            Self::SshPassword { .. } => "ssh-password",
            Self::Ed25519 { .. } => "ed25519",
            Self::Opaque { .. } => "opaque",
        }
    }

    /// Every piece of secret material this variant carries — used by tests
    /// and by `list` to assert no secret leaks into metadata output.
    pub fn secret_fields(&self) -> Vec<&str> {
        match self {
            Self::Bearer { token } => vec![token],
            Self::ApiKey { token, .. } => vec![token],
            Self::Basic { password, .. } => vec![password],
            Self::Query { token, .. } => vec![token],
            Self::OAuth2 {
                client_secret,
                refresh_token,
                ..
            } => vec![client_secret, refresh_token],
            Self::Db { password, .. } => vec![password],
            Self::SshKey {
                private_key,
                passphrase,
                ..
            } => {
                let mut fields = vec![private_key.as_str()];
                if let Some(passphrase) = passphrase {
                    fields.push(passphrase);
                }
                fields
            }
            Self::SshPassword { password, .. } => vec![password],
            Self::Ed25519 { private_key, .. } => vec![private_key],
            Self::Opaque { value } => vec![value],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A single decrypted vault entry, as returned by `get`.
pub struct CredentialEntry {
    pub protocol: Protocol,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub credential: Credential,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
/// Caller-supplied options accompanying `store`, beyond the credential itself.
pub struct StoreOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
/// Metadata-only view of an entry; never carries secret material. Returned
/// by `list`.
pub struct EntryMetadata {
    pub protocol: Protocol,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub credential_type: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One entry's ciphertext as stored on disk: `{iv, data, tag}`, all base64.
pub struct EncryptedEntryRecord {
    pub iv: String,
    pub data: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// The on-disk vault file shape (format version 1).
pub struct EncryptedVaultFile {
    pub version: u32,
    pub salt: String,
    pub entries: std::collections::BTreeMap<String, EncryptedEntryRecord>,
}

impl EncryptedVaultFile {
    pub fn new(salt: String) -> Self {
        Self {
            version: 1,
            salt,
            entries: std::collections::BTreeMap::new(),
        }
    }
}
