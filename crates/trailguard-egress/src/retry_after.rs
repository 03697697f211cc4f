//! Server retry hints
//!
//! A rate-limited response can say when to come back in two places: the
//! `retry-after` header (seconds or an HTTP date) and, for Gemini, a
//! `RetryInfo` detail whose `retryDelay` is a protobuf duration such as
//! `"17s"` or `"0.5s"`.

use serde_json::Value;
use tracing::debug;

/// Parse a `retry-after` header value into whole seconds from now
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    let value = header_value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    // HTTP-date, e.g. "Wed, 21 Oct 2015 07:28:00 GMT"; past dates mean now
    if let Ok(target) = chrono::DateTime::parse_from_rfc2822(value) {
        let seconds = target
            .signed_duration_since(chrono::Utc::now())
            .num_seconds()
            .max(0);
        return Some(seconds as u64);
    }

    debug!(header_value = value, "Ignoring unparseable retry-after header");
    None
}

/// Parse a protobuf duration string (`"17s"`, `"1.5s"`), rounding up
pub fn parse_retry_delay(delay: &str) -> Option<u64> {
    let seconds: f64 = delay.trim().strip_suffix('s')?.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(seconds.ceil() as u64)
}

/// Find the `RetryInfo.retryDelay` inside a Gemini error body
pub fn retry_delay_from_error_body(body: &Value) -> Option<u64> {
    body.pointer("/error/details")?
        .as_array()?
        .iter()
        .filter(|detail| {
            detail
                .get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"))
        })
        .find_map(|detail| detail.get("retryDelay")?.as_str().and_then(parse_retry_delay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_numeric_header() {
        assert_eq!(parse_retry_after("60"), Some(60));
        assert_eq!(parse_retry_after("  12 "), Some(12));
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_parse_http_date_header() {
        let future = chrono::Utc::now() + chrono::Duration::seconds(120);
        let seconds = parse_retry_after(&future.to_rfc2822()).unwrap();
        assert!((118..=120).contains(&seconds), "got {}", seconds);

        let past = chrono::Utc::now() - chrono::Duration::seconds(60);
        assert_eq!(parse_retry_after(&past.to_rfc2822()), Some(0));
    }

    #[test]
    fn test_parse_retry_delay() {
        assert_eq!(parse_retry_delay("17s"), Some(17));
        assert_eq!(parse_retry_delay("0.2s"), Some(1));
        assert_eq!(parse_retry_delay("17"), None);
        assert_eq!(parse_retry_delay("-1s"), None);
    }

    #[test]
    fn test_retry_delay_from_error_body() {
        let body = json!({
            "error": {
                "code": 429,
                "status": "RESOURCE_EXHAUSTED",
                "details": [
                    {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
                    {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "23s"}
                ]
            }
        });
        assert_eq!(retry_delay_from_error_body(&body), Some(23));
        assert_eq!(retry_delay_from_error_body(&json!({"error": {}})), None);
    }
}
