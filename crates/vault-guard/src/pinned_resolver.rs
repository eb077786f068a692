use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// A `reqwest` resolver that answers exactly one hostname with a fixed,
/// already-validated set of addresses. Building a fresh client around one of
/// these per hop pins the kernel's connect to the IPs the guard validated,
/// closing the DNS-rebinding window between validation and connect.
#[derive(Debug, Clone)]
pub struct PinnedResolver {
    host: Arc<str>,
    addrs: Arc<[SocketAddr]>,
}

impl PinnedResolver {
    pub fn new(host: impl Into<Arc<str>>, addrs: Vec<SocketAddr>) -> Self {
        Self {
            host: host.into(),
            addrs: addrs.into(),
        }
    }
}

impl Resolve for PinnedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = self.host.clone();
        let addrs = self.addrs.clone();
        Box::pin(async move {
            if name.as_str() != &*host {
                return Err(format!(
                    "pinned resolver asked to resolve unexpected host '{}', pinned to '{}'",
                    name.as_str(),
                    host
                )
                .into());
            }
            let iter: Addrs = Box::new(addrs.to_vec().into_iter());
            Ok(iter)
        })
    }
}
