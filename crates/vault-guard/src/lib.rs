//! SSRF/DNS-rebinding/redirect-safe outbound HTTP fetches, used whenever a
//! trusted component (today, the OAuth refresh engine) must call an
//! external URL.

mod classify;
mod dns_cache;
mod error;
mod fetch;
mod pinned_resolver;

pub use error::{FetchGuardCategory, FetchGuardError};
pub use fetch::{FetchGuard, FetchOutcome, FetchRequest};
