use std::sync::Arc;

use vault_oauth::OAuthEngine;
use vault_signer::Signer;
use vault_store::Vault;

/// Shared handles every connection handler dispatches into. Cheap to
/// clone — every field is already reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<Vault>,
    pub oauth: Arc<OAuthEngine>,
    pub signer: Arc<Signer>,
}
