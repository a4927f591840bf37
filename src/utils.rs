//! Utility functions for the Raven SDK
//!
//! Event ids, timestamps, body truncation and client address lookup.

use chrono::Utc;
use std::collections::HashMap;
use std::net::IpAddr;
use uuid::Uuid;

/// Timestamp layout accepted by the store endpoint
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Generate a unique event ID
///
/// UUID v4 rendered as 32 lowercase hex characters without dashes.
pub fn generate_event_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Get current UTC timestamp, e.g. "2024-01-15T10:30:00"
pub fn current_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Seconds since the unix epoch
pub fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Truncate body content to at most `max_len` bytes
///
/// Cuts on a char boundary and adds "... (truncated)" when truncation occurs.
pub fn truncate_body(body: &str, max_len: usize) -> String {
    if body.len() <= max_len {
        return body.to_string();
    }

    let mut end = max_len;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}

/// Client address for the `REMOTE_ADDR` snapshot entry
///
/// Proxy headers win over the socket peer: `x-real-ip`, then the left-most
/// parseable entry of `x-forwarded-for`. Values that are not IP addresses are
/// ignored.
pub fn remote_addr(headers: &HashMap<String, String>, peer: Option<IpAddr>) -> Option<IpAddr> {
    let real_ip: Option<IpAddr> = headers
        .get("x-real-ip")
        .and_then(|value| value.trim().parse().ok());

    let forwarded = || -> Option<IpAddr> {
        headers
            .get("x-forwarded-for")?
            .split(',')
            .find_map(|hop| hop.trim().parse().ok())
    };

    real_ip.or_else(forwarded).or(peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_event_id() {
        let id1 = generate_event_id();
        let id2 = generate_event_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_current_timestamp() {
        let ts = current_timestamp();

        assert!(ts.contains('T'));
        assert!(!ts.ends_with('Z'));
        chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).expect("Invalid timestamp");
    }

    #[test]
    fn test_unix_timestamp_is_recent() {
        assert!(unix_timestamp() > 1_600_000_000);
    }

    #[test]
    fn test_truncate_body_short() {
        let body = "Hello, World!";
        let result = truncate_body(body, 100);
        assert_eq!(result, "Hello, World!");
    }

    #[test]
    fn test_truncate_body_long() {
        let body = "A".repeat(1000);
        let result = truncate_body(&body, 50);

        assert_eq!(result.len(), 50 + "... (truncated)".len());
        assert!(result.starts_with("AAAA"));
        assert!(result.ends_with("... (truncated)"));
    }

    #[test]
    fn test_truncate_body_multibyte() {
        let body = "é".repeat(10);
        let result = truncate_body(&body, 5);
        assert_eq!(result, "éé... (truncated)");
    }

    #[test]
    fn test_truncate_body_exact_limit() {
        let body = "A".repeat(50);
        let result = truncate_body(&body, 50);
        assert_eq!(result, body);
        assert!(!result.contains("truncated"));
    }

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ip(addr: &str) -> IpAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_remote_addr_prefers_real_ip_header() {
        let headers = headers(&[
            ("x-real-ip", "198.51.100.7"),
            ("x-forwarded-for", "203.0.113.9"),
        ]);

        assert_eq!(remote_addr(&headers, Some(ip("10.0.0.1"))), Some(ip("198.51.100.7")));
    }

    #[test]
    fn test_remote_addr_skips_garbage_forwarded_hops() {
        let headers = headers(&[("x-forwarded-for", "unknown, 2001:db8::1, 10.0.0.1")]);

        assert_eq!(remote_addr(&headers, None), Some(ip("2001:db8::1")));
    }

    #[test]
    fn test_remote_addr_invalid_headers_fall_back_to_peer() {
        let headers = headers(&[("x-real-ip", "not-an-ip"), ("x-forwarded-for", "")]);

        assert_eq!(remote_addr(&headers, Some(ip("127.0.0.1"))), Some(ip("127.0.0.1")));
        assert_eq!(remote_addr(&HashMap::new(), None), None);
    }
}
