use std::path::PathBuf;

use clap::Parser;

const DEFAULT_DATA_DIR_NAME: &str = ".telclaude";
const DEFAULT_SOCKET_NAME: &str = "vault.sock";

/// Startup configuration for the vault daemon, resolved from CLI flags and
/// the environment variables the relay process sets.
#[derive(Debug, Parser)]
#[command(name = "vault-daemon", about = "Credential vault daemon")]
pub struct VaultDaemonConfig {
    /// Symmetric key material the store derives its encryption key from.
    /// Absence is a fatal startup error, checked explicitly in `main` rather
    /// than left to clap so the `missing_key` exit code is reachable.
    #[arg(long, env = "VAULT_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Base directory for the vault file and its corrupted-file quarantine.
    #[arg(long, env = "TELCLAUDE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Explicit Unix domain socket path. Overrides `TELCLAUDE_VAULT_SOCKET`
    /// and the default `${data_dir}/vault.sock` fallback.
    #[arg(long, env = "TELCLAUDE_VAULT_SOCKET")]
    pub socket_path: Option<PathBuf>,
}

impl VaultDaemonConfig {
    /// Returns the encryption key if one was supplied and it isn't
    /// empty/whitespace-only. `None` covers both the truly-absent case
    /// (no flag, no env var) and an explicit blank value.
    pub fn validated_encryption_key(&self) -> Option<&str> {
        self.encryption_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn vault_file_path(&self) -> PathBuf {
        self.data_dir().join("vault.json")
    }

    /// Resolves the socket path in precedence order: explicit `--socket-path`
    /// / `TELCLAUDE_VAULT_SOCKET` (clap already merges those), then
    /// `${data_dir}/vault.sock`.
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(DEFAULT_SOCKET_NAME))
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_DATA_DIR_NAME)
}
