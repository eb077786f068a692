use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use vault_core::current_unix_timestamp_ms;
use vault_ipc::{error, ok, ok_false, pong, Request};
use vault_oauth::OAuth2Credential;
use vault_store::{Credential, Protocol, StoreOptions};

use crate::state::AppState;

/// Dispatches one parsed request to the relevant component and builds its
/// response envelope. Never logs `request` payload contents — callers log
/// only line length and client id.
pub async fn dispatch(state: &AppState, request: Request) -> Value {
    match request {
        Request::Ping => pong(),
        Request::Get { protocol, target } => handle_get(state, protocol, &target),
        Request::GetToken { protocol, target } => handle_get_token(state, protocol, &target).await,
        Request::GetSecret { target } => handle_get_secret(state, &target),
        Request::Store {
            protocol,
            target,
            credential,
            options,
        } => handle_store(state, protocol, &target, credential, options).await,
        Request::Delete { protocol, target } => handle_delete(state, protocol, &target).await,
        Request::List { protocol } => handle_list(state, protocol),
        Request::SignToken {
            scope,
            session_id,
            ttl_ms,
        } => handle_sign_token(state, &scope, &session_id, ttl_ms),
        Request::VerifyToken { token } => handle_verify_token(state, &token),
        Request::GetPublicKey => handle_get_public_key(state),
        Request::SignPayload { payload, prefix } => handle_sign_payload(state, &payload, &prefix),
        Request::VerifyPayload {
            payload,
            signature,
            prefix,
        } => handle_verify_payload(state, &payload, &signature, &prefix),
    }
}

fn handle_get(state: &AppState, protocol: Protocol, target: &str) -> Value {
    match state.vault.get(protocol, target) {
        Ok(Some(entry)) => ok("get", json!({ "entry": entry })),
        Ok(None) => ok_false("get", "not_found"),
        Err(err) => error(err.to_string()),
    }
}

fn handle_get_secret(state: &AppState, target: &str) -> Value {
    match state.vault.get(Protocol::Secret, target) {
        Ok(Some(entry)) => match entry.credential {
            Credential::Opaque { value } => ok("get-secret", json!({ "value": value })),
            _ => ok_false("get-secret", "not_found"),
        },
        Ok(None) => ok_false("get-secret", "not_found"),
        Err(err) => error(err.to_string()),
    }
}

async fn handle_get_token(state: &AppState, protocol: Protocol, target: &str) -> Value {
    if protocol != Protocol::Http {
        return ok_false("get-token", "protocol must be http");
    }
    let entry = match state.vault.get(Protocol::Http, target) {
        Ok(Some(entry)) => entry,
        Ok(None) => return ok_false("get-token", "not_found"),
        Err(err) => return error(err.to_string()),
    };
    let Credential::OAuth2 {
        client_id,
        client_secret,
        refresh_token,
        token_endpoint,
        scope,
    } = entry.credential.clone()
    else {
        return ok_false("get-token", "stored credential is not oauth2");
    };

    let credential = OAuth2Credential {
        client_id,
        client_secret,
        refresh_token: refresh_token.clone(),
        token_endpoint,
        scope,
    };
    match state.oauth.get_access_token(target, credential).await {
        Ok(outcome) => {
            if let Some(rotated) = &outcome.new_refresh_token {
                persist_rotated_refresh_token(state, target, &entry, rotated);
            }
            ok(
                "get-token",
                json!({ "token": outcome.token, "expiresAt": outcome.expires_at_ms }),
            )
        }
        Err(err) => ok_false("get-token", err.to_string()),
    }
}

fn persist_rotated_refresh_token(
    state: &AppState,
    target: &str,
    entry: &vault_store::CredentialEntry,
    rotated_refresh_token: &str,
) {
    let Credential::OAuth2 {
        client_id,
        client_secret,
        token_endpoint,
        scope,
        ..
    } = &entry.credential
    else {
        return;
    };
    let rotated_credential = Credential::OAuth2 {
        client_id: client_id.clone(),
        client_secret: client_secret.clone(),
        refresh_token: rotated_refresh_token.to_string(),
        token_endpoint: token_endpoint.clone(),
        scope: scope.clone(),
    };
    let options = StoreOptions {
        label: entry.label.clone(),
        allowed_paths: entry.allowed_paths.clone(),
        rate_limit_per_minute: entry.rate_limit_per_minute,
        expires_at: entry.expires_at.clone(),
    };
    if let Err(err) = state
        .vault
        .store(Protocol::Http, target, rotated_credential, options)
    {
        tracing::error!(target, error = %err, "failed to persist rotated oauth refresh token");
    }
}

async fn handle_store(
    state: &AppState,
    protocol: Protocol,
    target: &str,
    credential: Credential,
    options: vault_ipc::StoreOptionsWire,
) -> Value {
    let is_oauth_http = protocol == Protocol::Http && matches!(credential, Credential::OAuth2 { .. });
    let store_options = StoreOptions {
        label: options.label,
        allowed_paths: options.allowed_paths,
        rate_limit_per_minute: options.rate_limit_per_minute,
        expires_at: options.expires_at,
    };
    match state.vault.store(protocol, target, credential, store_options) {
        Ok(()) => {
            if is_oauth_http {
                state.oauth.evict(target).await;
            }
            ok("store", json!({}))
        }
        Err(err) => error(err.to_string()),
    }
}

async fn handle_delete(state: &AppState, protocol: Protocol, target: &str) -> Value {
    match state.vault.delete(protocol, target) {
        Ok(deleted) => {
            if protocol == Protocol::Http {
                state.oauth.evict(target).await;
            }
            ok("delete", json!({ "deleted": deleted }))
        }
        Err(err) => error(err.to_string()),
    }
}

fn handle_list(state: &AppState, protocol: Option<Protocol>) -> Value {
    match state.vault.list(protocol) {
        Ok(entries) => ok("list", json!({ "entries": entries })),
        Err(err) => error(err.to_string()),
    }
}

fn handle_sign_token(state: &AppState, scope: &str, session_id: &str, ttl_ms: u64) -> Value {
    let now = current_unix_timestamp_ms();
    match state.signer.sign_token(scope, session_id, ttl_ms, now) {
        Ok((token, expires_at)) => ok("sign-token", json!({ "token": token, "expiresAt": expires_at })),
        Err(err) => error(err.to_string()),
    }
}

fn handle_verify_token(state: &AppState, token: &str) -> Value {
    let now = current_unix_timestamp_ms();
    match state.signer.verify_token(token, now) {
        Ok(verified) => ok(
            "verify-token",
            json!({
                "scope": verified.scope,
                "sessionId": verified.session_id,
                "createdAt": verified.created_at,
                "expiresAt": verified.expires_at,
            }),
        ),
        Err(err) => ok_false("verify-token", err.to_string()),
    }
}

fn handle_get_public_key(state: &AppState) -> Value {
    match state.signer.public_key_base64() {
        Ok(public_key) => ok("get-public-key", json!({ "publicKey": public_key })),
        Err(err) => error(err.to_string()),
    }
}

fn handle_sign_payload(state: &AppState, payload_b64: &str, prefix_b64: &str) -> Value {
    let (payload, prefix) = match decode_payload_and_prefix(payload_b64, prefix_b64) {
        Ok(pair) => pair,
        Err(message) => return error(message),
    };
    match state.signer.sign_payload(&payload, &prefix) {
        Ok(signature) => ok("sign-payload", json!({ "signature": BASE64.encode(signature) })),
        Err(err) => error(err.to_string()),
    }
}

fn handle_verify_payload(
    state: &AppState,
    payload_b64: &str,
    signature_b64: &str,
    prefix_b64: &str,
) -> Value {
    let (payload, prefix) = match decode_payload_and_prefix(payload_b64, prefix_b64) {
        Ok(pair) => pair,
        Err(message) => return error(message),
    };
    let signature = match BASE64.decode(signature_b64) {
        Ok(bytes) => bytes,
        Err(_) => return error("signature is not valid base64"),
    };
    match state.signer.verify_payload(&payload, &signature, &prefix) {
        Ok(valid) => ok("verify-payload", json!({ "valid": valid })),
        Err(err) => error(err.to_string()),
    }
}

fn decode_payload_and_prefix(payload_b64: &str, prefix_b64: &str) -> Result<(Vec<u8>, Vec<u8>), String> {
    let payload = BASE64
        .decode(payload_b64)
        .map_err(|_| "payload is not valid base64".to_string())?;
    let prefix = BASE64
        .decode(prefix_b64)
        .map_err(|_| "prefix is not valid base64".to_string())?;
    Ok((payload, prefix))
}
