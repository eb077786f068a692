//! Foundational low-level utilities shared across vault crates.
//!
//! Provides atomic file-write helpers, time utilities for expiry
//! calculations, and error-string redaction for anything that might
//! otherwise leak a token endpoint URL into a log or IPC response.

pub mod atomic_io;
pub mod redaction;
pub mod time_utils;

pub use atomic_io::{ensure_dir_mode, write_bytes_atomic};
pub use redaction::redact_urls;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, is_expired_unix_ms};
