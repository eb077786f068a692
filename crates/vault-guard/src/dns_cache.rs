use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::net::lookup_host;

use crate::error::{FetchGuardCategory, FetchGuardError};

const CACHE_TTL: Duration = Duration::from_secs(60);
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

struct CacheEntry {
    addrs: Vec<IpAddr>,
    expires_at: Instant,
}

/// Caches DNS answers for `host:port` for [`CACHE_TTL`], so repeated requests
/// to the same token endpoint do not re-resolve on every call while still
/// bounding how long a stale (possibly rebound) answer can be trusted.
pub struct DnsCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DnsCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves `host:port`, returning every answer. Rejects on empty or
    /// timed-out resolution.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchGuardError> {
        let cache_key = format!("{host}:{port}");
        if let Some(addrs) = self.cached(&cache_key) {
            return Ok(addrs);
        }

        let lookup_target = cache_key.clone();
        let addrs: Vec<IpAddr> = tokio::time::timeout(LOOKUP_TIMEOUT, lookup_host(lookup_target))
            .await
            .map_err(|_| {
                FetchGuardError::new(
                    FetchGuardCategory::DnsFailure,
                    format!("DNS resolution for '{host}' timed out"),
                )
            })?
            .map_err(|error| {
                FetchGuardError::new(
                    FetchGuardCategory::DnsFailure,
                    format!("DNS resolution for '{host}' failed: {error}"),
                )
            })?
            .map(|socket_addr: SocketAddr| socket_addr.ip())
            .collect();

        if addrs.is_empty() {
            return Err(FetchGuardError::new(
                FetchGuardCategory::DnsFailure,
                format!("host '{host}' resolved no addresses"),
            ));
        }

        self.entries.lock().expect("dns cache mutex poisoned").insert(
            cache_key,
            CacheEntry {
                addrs: addrs.clone(),
                expires_at: Instant::now() + CACHE_TTL,
            },
        );
        Ok(addrs)
    }

    fn cached(&self, cache_key: &str) -> Option<Vec<IpAddr>> {
        let entries = self.entries.lock().expect("dns cache mutex poisoned");
        let entry = entries.get(cache_key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.addrs.clone())
    }
}

impl Default for DnsCache {
    fn default() -> Self {
        Self::new()
    }
}
