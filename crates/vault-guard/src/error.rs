use thiserror::Error;

/// Stable category for a blocked or failed outbound fetch, per the guard's
/// failure taxonomy. Never derived from raw transport error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchGuardCategory {
    InvalidUrl,
    UnsupportedScheme,
    DnsFailure,
    NonOverridable,
    PrivateDisallowed,
    TooManyRedirects,
    RedirectLoop,
    RedirectMissingLocation,
    Timeout,
    Aborted,
    Transport,
}

impl FetchGuardCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid-url",
            Self::UnsupportedScheme => "unsupported-scheme",
            Self::DnsFailure => "dns-failure",
            Self::NonOverridable => "non-overridable",
            Self::PrivateDisallowed => "private-disallowed",
            Self::TooManyRedirects => "too-many-redirects",
            Self::RedirectLoop => "redirect-loop",
            Self::RedirectMissingLocation => "redirect-missing-location",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
            Self::Transport => "transport",
        }
    }
}

impl std::fmt::Display for FetchGuardCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{category}: {message}")]
pub struct FetchGuardError {
    pub category: FetchGuardCategory,
    pub message: String,
}

impl FetchGuardError {
    pub fn new(category: FetchGuardCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}
