/// Replaces any `http(s)://...` substring in `message` with `[URL REDACTED]`.
///
/// Used anywhere an error string might otherwise echo a token endpoint (and
/// any query-string credentials embedded in it) back to an IPC caller or log.
pub fn redact_urls(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;
    loop {
        let Some(start) = find_scheme(rest) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        let after_scheme = &rest[start..];
        let end = after_scheme
            .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ')' | ']' | '>'))
            .unwrap_or(after_scheme.len());
        out.push_str("[URL REDACTED]");
        rest = &after_scheme[end..];
    }
    out
}

fn find_scheme(s: &str) -> Option<usize> {
    let https = s.find("https://");
    let http = s.find("http://");
    match (https, http) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::redact_urls;

    #[test]
    fn redact_urls_replaces_single_url() {
        assert_eq!(
            redact_urls("failed to fetch https://idp.test/tok?client_secret=abc: timeout"),
            "failed to fetch [URL REDACTED]: timeout"
        );
    }

    #[test]
    fn redact_urls_replaces_multiple_urls() {
        let input = "redirect from http://a.test/x to https://b.test/y rejected";
        assert_eq!(
            redact_urls(input),
            "redirect from [URL REDACTED] to [URL REDACTED] rejected"
        );
    }

    #[test]
    fn redact_urls_leaves_url_free_text_untouched() {
        assert_eq!(redact_urls("decrypt failure for entry"), "decrypt failure for entry");
    }
}
