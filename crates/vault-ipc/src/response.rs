use serde_json::{json, Value};

/// `{type:"pong"}` — the only response with neither `ok` nor `error`.
pub fn pong() -> Value {
    json!({"type": "pong"})
}

/// `{type:<op>, ok:true, ...extra}`.
pub fn ok(op: &str, mut extra: Value) -> Value {
    let object = extra.as_object_mut().expect("ok() extra must be an object");
    object.insert("type".to_string(), json!(op));
    object.insert("ok".to_string(), json!(true));
    extra
}

/// `{type:<op>, ok:false, error:<message>}` — used by ops whose failure
/// mode is reported inline rather than as a `{type:"error"}` envelope
/// (`get`, `get-token`, `get-secret`, `verify-token`).
pub fn ok_false(op: &str, error: impl Into<String>) -> Value {
    json!({"type": op, "ok": false, "error": error.into()})
}

/// `{type:"error", error:<message>}` — malformed lines and op failures that
/// are not modeled as `ok:false`.
pub fn error(message: impl Into<String>) -> Value {
    json!({"type": "error", "error": message.into()})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_merges_type_and_ok_into_extra_fields() {
        let response = ok("get", json!({"entry": {"target": "x"}}));
        assert_eq!(response["type"], "get");
        assert_eq!(response["ok"], true);
        assert_eq!(response["entry"]["target"], "x");
    }

    #[test]
    fn ok_false_carries_error_string() {
        let response = ok_false("get", "not_found");
        assert_eq!(response["ok"], false);
        assert_eq!(response["error"], "not_found");
    }
}
