use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, Response};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use crate::classify::{classify_ip, is_localhost_hostname, is_metadata_hostname, IpClass};
use crate::dns_cache::DnsCache;
use crate::error::{FetchGuardCategory, FetchGuardError};
use crate::pinned_resolver::PinnedResolver;

const DEFAULT_MAX_REDIRECTS: u32 = 3;

/// A guarded outbound fetch request. `private_endpoints` lists `(host, port)`
/// pairs that are allowed to resolve into private address space despite the
/// default-deny policy; it never overrides the non-overridable block list.
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub max_redirects: u32,
    pub private_endpoints: Vec<(String, u16)>,
    pub abort: Option<oneshot::Receiver<()>>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(30),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            private_endpoints: Vec::new(),
            abort: None,
        }
    }
}

pub struct FetchOutcome {
    pub response: Response,
    pub final_url: Url,
}

/// Performs SSRF/DNS-rebinding/redirect-safe outbound HTTP fetches. Holds a
/// shared DNS cache so repeated calls to the same token endpoint amortize
/// resolution cost without trusting a stale answer past its TTL.
pub struct FetchGuard {
    dns_cache: DnsCache,
}

impl FetchGuard {
    pub fn new() -> Self {
        Self {
            dns_cache: DnsCache::new(),
        }
    }

    pub async fn fetch_with_guard(
        &self,
        mut request: FetchRequest,
    ) -> Result<FetchOutcome, FetchGuardError> {
        let mut current_url = parse_url(&request.url)?;
        let mut visited = HashSet::new();
        let mut redirects_followed = 0u32;

        loop {
            validate_scheme(&current_url)?;

            let canonical = canonical_url_string(&current_url);
            if !visited.insert(canonical) {
                return Err(FetchGuardError::new(
                    FetchGuardCategory::RedirectLoop,
                    format!("redirect loop detected at '{current_url}'"),
                ));
            }

            let host = normalized_host(&current_url)?;
            let port = current_url.port_or_known_default().ok_or_else(|| {
                FetchGuardError::new(
                    FetchGuardCategory::InvalidUrl,
                    format!("URL '{current_url}' has no known default port"),
                )
            })?;

            if is_metadata_hostname(&host) {
                return Err(FetchGuardError::new(
                    FetchGuardCategory::NonOverridable,
                    format!("blocked outbound metadata hostname '{host}'"),
                ));
            }

            let allowlisted = request
                .private_endpoints
                .iter()
                .any(|(allow_host, allow_port)| allow_host == &host && *allow_port == port);

            if is_localhost_hostname(&host) && !allowlisted {
                return Err(FetchGuardError::new(
                    FetchGuardCategory::PrivateDisallowed,
                    format!("blocked outbound localhost hostname '{host}'"),
                ));
            }

            let addrs = self.resolve_and_classify(&host, port, allowlisted).await?;
            let socket_addrs: Vec<SocketAddr> =
                addrs.iter().map(|ip| SocketAddr::new(*ip, port)).collect();

            let client = build_pinned_client(&host, socket_addrs, request.timeout)?;
            let mut builder = client
                .request(request.method.clone(), current_url.clone())
                .headers(request.headers.clone());
            if let Some(body) = request.body.clone() {
                builder = builder.body(body);
            }

            let response = send_with_abort(builder, request.abort.as_mut()).await?;
            let status = response.status();

            if status.is_redirection() {
                redirects_followed += 1;
                if redirects_followed > request.max_redirects {
                    return Err(FetchGuardError::new(
                        FetchGuardCategory::TooManyRedirects,
                        format!(
                            "exceeded max redirects ({}) fetching '{}'",
                            request.max_redirects, request.url
                        ),
                    ));
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .ok_or_else(|| {
                        FetchGuardError::new(
                            FetchGuardCategory::RedirectMissingLocation,
                            format!("redirect from '{current_url}' carried no Location header"),
                        )
                    })?
                    .to_str()
                    .map_err(|_| {
                        FetchGuardError::new(
                            FetchGuardCategory::RedirectMissingLocation,
                            "Location header is not valid UTF-8".to_string(),
                        )
                    })?;
                current_url = current_url.join(location).map_err(|error| {
                    FetchGuardError::new(
                        FetchGuardCategory::InvalidUrl,
                        format!("redirect Location '{location}' is not a valid URL: {error}"),
                    )
                })?;
                debug!(next_url = %current_url, "following guarded redirect");
                continue;
            }

            return Ok(FetchOutcome {
                response,
                final_url: current_url,
            });
        }
    }

    async fn resolve_and_classify(
        &self,
        host: &str,
        port: u16,
        allowlisted: bool,
    ) -> Result<Vec<IpAddr>, FetchGuardError> {
        let addrs = if let Ok(ip) = host.parse::<IpAddr>() {
            vec![ip]
        } else {
            self.dns_cache.resolve(host, port).await?
        };

        for addr in &addrs {
            match classify_ip(*addr) {
                IpClass::NonOverridable => {
                    return Err(FetchGuardError::new(
                        FetchGuardCategory::NonOverridable,
                        format!("blocked outbound non-overridable address '{addr}' for host '{host}'"),
                    ))
                }
                IpClass::Private if !allowlisted => {
                    return Err(FetchGuardError::new(
                        FetchGuardCategory::PrivateDisallowed,
                        format!("blocked outbound private address '{addr}' for host '{host}'"),
                    ))
                }
                IpClass::Private | IpClass::Ok => {}
            }
        }
        Ok(addrs)
    }
}

impl Default for FetchGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn build_pinned_client(
    host: &str,
    addrs: Vec<SocketAddr>,
    timeout: Duration,
) -> Result<reqwest::Client, FetchGuardError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .dns_resolver(Arc::new(PinnedResolver::new(host.to_string(), addrs)))
        .timeout(timeout)
        .build()
        .map_err(|error| {
            FetchGuardError::new(
                FetchGuardCategory::Transport,
                format!("failed to build guarded HTTP client: {error}"),
            )
        })
}

async fn send_with_abort(
    builder: reqwest::RequestBuilder,
    abort: Option<&mut oneshot::Receiver<()>>,
) -> Result<Response, FetchGuardError> {
    let send = builder.send();
    let result = match abort {
        Some(abort_rx) => {
            tokio::select! {
                result = send => result,
                _ = abort_rx => {
                    return Err(FetchGuardError::new(
                        FetchGuardCategory::Aborted,
                        "fetch aborted by caller-supplied signal".to_string(),
                    ))
                }
            }
        }
        None => send.await,
    };
    result.map_err(|error| {
        if error.is_timeout() {
            FetchGuardError::new(FetchGuardCategory::Timeout, error.to_string())
        } else {
            warn!(error = %error, "guarded fetch transport error");
            FetchGuardError::new(FetchGuardCategory::Transport, error.to_string())
        }
    })
}

fn parse_url(raw: &str) -> Result<Url, FetchGuardError> {
    Url::parse(raw).map_err(|error| {
        FetchGuardError::new(
            FetchGuardCategory::InvalidUrl,
            format!("invalid outbound URL '{raw}': {error}"),
        )
    })
}

fn validate_scheme(url: &Url) -> Result<(), FetchGuardError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(FetchGuardError::new(
            FetchGuardCategory::UnsupportedScheme,
            format!("unsupported outbound scheme '{scheme}' for URL '{url}'"),
        )),
    }
}

fn normalized_host(url: &Url) -> Result<String, FetchGuardError> {
    let host = url.host_str().ok_or_else(|| {
        FetchGuardError::new(
            FetchGuardCategory::InvalidUrl,
            format!("URL '{url}' is missing a host"),
        )
    })?;
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return Err(FetchGuardError::new(
            FetchGuardCategory::InvalidUrl,
            format!("URL '{url}' resolved to an empty host"),
        ));
    }
    Ok(host)
}

fn canonical_url_string(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);
    canonical.to_string()
}
