mod config;
mod dispatch;
mod exit_codes;
mod rpc_auth;
mod server;
mod state;

use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use clap::Parser;

use config::VaultDaemonConfig;
use exit_codes::ExitCode;
use state::AppState;
use vault_guard::FetchGuard;
use vault_oauth::OAuthEngine;
use vault_signer::Signer;
use vault_store::Vault;

#[tokio::main]
async fn main() -> ProcessExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = VaultDaemonConfig::parse();

    let encryption_key = match config.validated_encryption_key() {
        Some(key) => key.to_string(),
        None => {
            tracing::error!(reason = ExitCode::MissingKey.reason(), "vault encryption key is missing");
            return ProcessExitCode::from(ExitCode::MissingKey.code() as u8);
        }
    };

    let vault = match Vault::open(config.vault_file_path(), encryption_key.into_bytes()) {
        Ok(vault) => Arc::new(vault),
        Err(err) => {
            tracing::error!(error = %err, "failed to open vault store");
            return ProcessExitCode::from(ExitCode::SocketBind.code() as u8);
        }
    };

    let guard = Arc::new(FetchGuard::new());
    let oauth = Arc::new(OAuthEngine::new(guard));
    let signer = Arc::new(Signer::new(vault.clone()));

    let state = AppState { vault, oauth, signer };

    let socket_path = config.socket_path();
    let listener = match server::bind_socket(&socket_path) {
        Ok(listener) => listener,
        Err(exit_code) => {
            tracing::error!(reason = exit_code.reason(), path = %socket_path.display(), "failed to bind vault socket");
            return ProcessExitCode::from(exit_code.code() as u8);
        }
    };

    tracing::info!(path = %socket_path.display(), "vault daemon listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal, draining connections");
    };

    server::run(listener, socket_path, state, shutdown).await;

    tracing::info!("vault daemon stopped");
    ProcessExitCode::SUCCESS
}
