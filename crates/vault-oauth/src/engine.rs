use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use vault_core::{current_unix_timestamp_ms, redact_urls};
use vault_guard::{FetchGuard, FetchRequest};

use crate::error::OAuthError;
use crate::types::{CachedToken, OAuth2Credential, RefreshOutcome, TokenEndpointResponse};

const EXPIRY_SKEW_MS: u64 = 5 * 60 * 1000;
const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

type RefreshResult = Result<RefreshOutcome, OAuthError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Per-target access-token cache with single-flight refresh coordination.
///
/// At most one outbound HTTP call to a target's token endpoint is ever
/// in flight at a time; concurrent callers share its result.
pub struct OAuthEngine {
    guard: Arc<FetchGuard>,
    cache: Arc<AsyncMutex<HashMap<String, CachedToken>>>,
    pending: Arc<AsyncMutex<HashMap<String, SharedRefresh>>>,
}

impl OAuthEngine {
    pub fn new(guard: Arc<FetchGuard>) -> Self {
        Self {
            guard,
            cache: Arc::new(AsyncMutex::new(HashMap::new())),
            pending: Arc::new(AsyncMutex::new(HashMap::new())),
        }
    }

    /// Returns a currently-valid access token for `target`, refreshing it
    /// through `credential` if the cache is cold or within the expiry skew.
    pub async fn get_access_token(
        &self,
        target: &str,
        credential: OAuth2Credential,
    ) -> RefreshResult {
        let now = current_unix_timestamp_ms();
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(target) {
                if cached.expires_at_ms > now + EXPIRY_SKEW_MS {
                    return Ok(RefreshOutcome {
                        token: cached.access_token.clone(),
                        expires_at_ms: cached.expires_at_ms,
                        new_refresh_token: None,
                    });
                }
            }
        }

        let shared_future = {
            let mut pending = self.pending.lock().await;
            if let Some(existing) = pending.get(target) {
                existing.clone()
            } else {
                let future = self.spawn_refresh(target.to_string(), credential);
                pending.insert(target.to_string(), future.clone());
                future
            }
        };

        shared_future.await
    }

    fn spawn_refresh(&self, target: String, credential: OAuth2Credential) -> SharedRefresh {
        let guard = self.guard.clone();
        let cache = self.cache.clone();
        let pending = self.pending.clone();

        let future: BoxFuture<'static, RefreshResult> = async move {
            let result = refresh_via_token_endpoint(&guard, &credential).await;
            match &result {
                Ok(outcome) => {
                    cache.lock().await.insert(
                        target.clone(),
                        CachedToken {
                            access_token: outcome.token.clone(),
                            expires_at_ms: outcome.expires_at_ms,
                        },
                    );
                    info!(target = %target, "refreshed oauth access token");
                }
                Err(error) => {
                    warn!(target = %target, error = %error, "oauth token refresh failed");
                }
            }
            pending.lock().await.remove(&target);
            result
        }
        .boxed();

        future.shared()
    }

    /// Evicts every cached token whose expiry has already passed. Intended
    /// to run on a periodic timer (every 60 s) from the daemon's main loop.
    pub async fn sweep_expired(&self) {
        let now = current_unix_timestamp_ms();
        let mut cache = self.cache.lock().await;
        let before = cache.len();
        cache.retain(|_, token| token.expires_at_ms > now);
        let evicted = before - cache.len();
        if evicted > 0 {
            info!(evicted, "swept expired oauth tokens from cache");
        }
    }

    /// Drops any cached token for `target`, forcing the next request to
    /// refresh. Called by the dispatcher after a `store`/`delete` so a
    /// stale credential is never served from cache.
    pub async fn evict(&self, target: &str) {
        self.cache.lock().await.remove(target);
    }

    /// Drops every cached access token. Called on graceful shutdown so a
    /// restarted daemon never inherits a warm cache across a process
    /// boundary it cannot account for.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
    }
}

async fn refresh_via_token_endpoint(
    guard: &FetchGuard,
    credential: &OAuth2Credential,
) -> RefreshResult {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", credential.refresh_token.as_str()),
        ("client_id", credential.client_id.as_str()),
        ("client_secret", credential.client_secret.as_str()),
    ];
    if let Some(scope) = credential.scope.as_deref() {
        form.push(("scope", scope));
    }
    let body = serde_urlencoded_form(&form);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/x-www-form-urlencoded"),
    );

    let mut request = FetchRequest::get(credential.token_endpoint.clone());
    request.method = reqwest::Method::POST;
    request.headers = headers;
    request.body = Some(body.into_bytes());
    request.timeout = REFRESH_TIMEOUT;
    request.max_redirects = 0;

    let outcome = guard
        .fetch_with_guard(request)
        .await
        .map_err(|error| OAuthError::Refresh(redact_urls(&error.to_string())))?;

    let response = outcome
        .response
        .json::<TokenEndpointResponse>()
        .await
        .map_err(|error| OAuthError::MalformedResponse(redact_urls(&error.to_string())))?;

    let now = current_unix_timestamp_ms();
    let expires_at_ms = now + response.expires_in_seconds() * 1000;
    let new_refresh_token = response
        .refresh_token
        .filter(|rotated| rotated != &credential.refresh_token);

    Ok(RefreshOutcome {
        token: response.access_token,
        expires_at_ms,
        new_refresh_token,
    })
}

fn serde_urlencoded_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencode(key), urlencode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn credential_for(server: &MockServer, refresh_token: &str) -> OAuth2Credential {
        OAuth2Credential {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: refresh_token.to_string(),
            token_endpoint: server.url("/token"),
            scope: None,
        }
    }

    #[test]
    fn urlencode_escapes_reserved_bytes() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
        assert_eq!(urlencode("plain-value_1.2~3"), "plain-value_1.2~3");
    }

    #[tokio::test]
    async fn concurrent_get_access_token_calls_coalesce_into_one_http_call() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.delay(std::time::Duration::from_millis(100))
                .status(200)
                .json_body(json!({"access_token": "tok-1", "expires_in": 3600}));
        });

        let engine = Arc::new(OAuthEngine::new(Arc::new(FetchGuard::new())));
        let credential = credential_for(&server, "refresh-1");

        let mut handles = Vec::new();
        for _ in 0..5 {
            let engine = engine.clone();
            let credential = credential.clone();
            handles.push(tokio::spawn(async move {
                engine.get_access_token("target", credential).await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap().expect("refresh succeeds");
            assert_eq!(outcome.token, "tok-1");
        }
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_surfaced_in_outcome() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({
                "access_token": "tok-rotated",
                "expires_in": 3600,
                "refresh_token": "refresh-2",
            }));
        });

        let engine = OAuthEngine::new(Arc::new(FetchGuard::new()));
        let credential = credential_for(&server, "refresh-1");
        let outcome = engine
            .get_access_token("target", credential)
            .await
            .expect("refresh succeeds");

        assert_eq!(outcome.token, "tok-rotated");
        assert_eq!(outcome.new_refresh_token.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn unrotated_refresh_token_is_not_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200).json_body(json!({
                "access_token": "tok-1",
                "expires_in": 3600,
                "refresh_token": "refresh-1",
            }));
        });

        let engine = OAuthEngine::new(Arc::new(FetchGuard::new()));
        let credential = credential_for(&server, "refresh-1");
        let outcome = engine
            .get_access_token("target", credential)
            .await
            .expect("refresh succeeds");

        assert!(outcome.new_refresh_token.is_none());
    }

    #[tokio::test]
    async fn sweep_expired_evicts_only_past_expiry() {
        let engine = OAuthEngine::new(Arc::new(FetchGuard::new()));
        {
            let mut cache = engine.cache.lock().await;
            cache.insert(
                "expired".to_string(),
                CachedToken {
                    access_token: "a".to_string(),
                    expires_at_ms: 0,
                },
            );
            cache.insert(
                "fresh".to_string(),
                CachedToken {
                    access_token: "b".to_string(),
                    expires_at_ms: u64::MAX,
                },
            );
        }
        engine.sweep_expired().await;
        let cache = engine.cache.lock().await;
        assert!(!cache.contains_key("expired"));
        assert!(cache.contains_key("fresh"));
    }

    #[tokio::test]
    async fn cached_token_within_skew_is_reused_without_refresh() {
        let engine = OAuthEngine::new(Arc::new(FetchGuard::new()));
        let now = current_unix_timestamp_ms();
        engine.cache.lock().await.insert(
            "target".to_string(),
            CachedToken {
                access_token: "cached-token".to_string(),
                expires_at_ms: now + EXPIRY_SKEW_MS + 60_000,
            },
        );
        let credential = OAuth2Credential {
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            refresh_token: "r".to_string(),
            token_endpoint: "https://idp.invalid/tok".to_string(),
            scope: None,
        };
        let outcome = engine.get_access_token("target", credential).await.unwrap();
        assert_eq!(outcome.token, "cached-token");
        assert!(outcome.new_refresh_token.is_none());
    }

    #[tokio::test]
    async fn evict_forces_next_call_to_refresh() {
        let engine = OAuthEngine::new(Arc::new(FetchGuard::new()));
        let now = current_unix_timestamp_ms();
        engine.cache.lock().await.insert(
            "target".to_string(),
            CachedToken {
                access_token: "stale".to_string(),
                expires_at_ms: now + EXPIRY_SKEW_MS + 60_000,
            },
        );
        engine.evict("target").await;
        assert!(!engine.cache.lock().await.contains_key("target"));
    }
}
