use serde::Deserialize;
use vault_store::{Credential, Protocol};

use crate::error::ProtocolError;

/// Maximum permitted size, in bytes, of a single NDJSON request line.
/// Exceeding this closes the connection per the wire protocol's line-size
/// policy.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreOptionsWire {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub allowed_paths: Option<Vec<String>>,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// The strictly-validated discriminated union of request envelopes accepted
/// over the IPC socket. Unknown fields on any op are rejected.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum Request {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "get")]
    Get { protocol: Protocol, target: String },
    #[serde(rename = "get-token")]
    GetToken { protocol: Protocol, target: String },
    #[serde(rename = "get-secret")]
    GetSecret { target: String },
    #[serde(rename = "store")]
    Store {
        protocol: Protocol,
        target: String,
        credential: Credential,
        #[serde(flatten)]
        options: StoreOptionsWire,
    },
    #[serde(rename = "delete")]
    Delete { protocol: Protocol, target: String },
    #[serde(rename = "list")]
    List {
        #[serde(default)]
        protocol: Option<Protocol>,
    },
    #[serde(rename = "sign-token")]
    SignToken {
        scope: String,
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "ttlMs")]
        ttl_ms: u64,
    },
    #[serde(rename = "verify-token")]
    VerifyToken { token: String },
    #[serde(rename = "get-public-key")]
    GetPublicKey,
    #[serde(rename = "sign-payload")]
    SignPayload { payload: String, prefix: String },
    #[serde(rename = "verify-payload")]
    VerifyPayload {
        payload: String,
        signature: String,
        prefix: String,
    },
}

/// Parses one NDJSON line (without its trailing `\n`) into a [`Request`],
/// enforcing the line-size limit and strict schema validation.
pub fn parse_request_line(line: &[u8]) -> Result<Request, ProtocolError> {
    if line.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::LineTooLong(MAX_LINE_BYTES));
    }
    serde_json::from_slice(line).map_err(|error| ProtocolError::Schema(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ping() {
        let request = parse_request_line(br#"{"type":"ping"}"#).unwrap();
        assert!(matches!(request, Request::Ping));
    }

    #[test]
    fn parses_store_with_options() {
        let request = parse_request_line(
            br#"{"type":"store","protocol":"http","target":"api.x.test","credential":{"type":"bearer","token":"T"},"label":"prod","rateLimitPerMinute":60}"#,
        )
        .unwrap();
        match request {
            Request::Store {
                protocol,
                target,
                credential,
                options,
            } => {
                assert_eq!(protocol, Protocol::Http);
                assert_eq!(target, "api.x.test");
                assert_eq!(credential, Credential::Bearer { token: "T".into() });
                assert_eq!(options.label.as_deref(), Some("prod"));
                assert_eq!(options.rate_limit_per_minute, Some(60));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = parse_request_line(br#"{"type":"ping","extra":"nope"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_op() {
        let result = parse_request_line(br#"{"type":"not-a-real-op"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_oversize_line() {
        let oversized = vec![b'a'; MAX_LINE_BYTES + 1];
        let result = parse_request_line(&oversized);
        assert!(matches!(result, Err(ProtocolError::LineTooLong(_))));
    }

    #[test]
    fn sign_token_uses_camel_case_fields() {
        let request = parse_request_line(
            br#"{"type":"sign-token","scope":"tg","sessionId":"s1","ttlMs":60000}"#,
        )
        .unwrap();
        match request {
            Request::SignToken {
                scope,
                session_id,
                ttl_ms,
            } => {
                assert_eq!(scope, "tg");
                assert_eq!(session_id, "s1");
                assert_eq!(ttl_ms, 60000);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
