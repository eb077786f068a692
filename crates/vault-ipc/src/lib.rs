//! The vault's newline-delimited JSON wire protocol: request envelope
//! parsing with strict schema validation, and response envelope builders.
//! Connection framing and dispatch to the storage/OAuth/signing components
//! live in the daemon binary, which depends on this crate for the shapes.

mod error;
mod request;
mod response;

pub use error::ProtocolError;
pub use request::{parse_request_line, Request, StoreOptionsWire, MAX_LINE_BYTES};
pub use response::{error, ok, ok_false, pong};
