//! HTTP cache control module
//!
//! Provides `ETag` generation, HTTP-date handling and conditional request checks.

use chrono::{DateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format used by `Last-Modified` and friends (IMF-fixdate)
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Generate a weak `ETag` from file metadata
///
/// The tag changes whenever the size or modification time changes, without
/// reading the file content.
///
/// # Returns
/// Weak `ETag` string, e.g., `W/"1a2b-18c3f2e1d40"`
pub fn generate_etag(len: u64, modified: Option<SystemTime>) -> String {
    let millis = modified
        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis());
    format!("W/\"{len:x}-{millis:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Uses weak comparison, so `W/"x"` and `"x"` match each other.
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = strip_weak(etag);
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').map(str::trim).any(|e| e == "*" || strip_weak(e) == ours)
    })
}

fn strip_weak(etag: &str) -> &str {
    etag.strip_prefix("W/").unwrap_or(etag)
}

/// Format a timestamp as an HTTP-date
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an HTTP-date header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether `If-Modified-Since` allows answering 304
///
/// HTTP dates have second precision, so sub-second parts of the file's
/// modification time are ignored.
pub fn not_modified_since(if_modified_since: Option<&str>, modified: Option<SystemTime>) -> bool {
    let (Some(header), Some(modified)) = (if_modified_since, modified) else {
        return false;
    };
    let Some(since) = parse_http_date(header) else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// Cache but always revalidate
    NoCache,
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_generate_etag() {
        let etag = generate_etag(11, Some(UNIX_EPOCH + Duration::from_secs(1)));
        assert_eq!(etag, "W/\"b-3e8\"");
    }

    #[test]
    fn test_etag_difference() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_ne!(generate_etag(10, Some(t)), generate_etag(11, Some(t)));
        assert_ne!(
            generate_etag(10, Some(t)),
            generate_etag(10, Some(t + Duration::from_secs(1)))
        );
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "W/\"abc123\"";
        assert!(check_etag_match(Some("W/\"abc123\""), etag));
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", W/\"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_http_date_format() {
        let t = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(format_http_date(t), "Sun, 06 Nov 1994 08:49:37 GMT");
        let parsed = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!(parsed.timestamp(), 784_111_777);
        assert!(parse_http_date("yesterday").is_none());
    }

    #[test]
    fn test_not_modified_since() {
        let modified = Some(UNIX_EPOCH + Duration::from_millis(784_111_777_500));
        assert!(not_modified_since(
            Some("Sun, 06 Nov 1994 08:49:37 GMT"),
            modified
        ));
        assert!(!not_modified_since(
            Some("Sun, 06 Nov 1994 08:49:36 GMT"),
            modified
        ));
        assert!(!not_modified_since(Some("garbage"), modified));
        assert!(!not_modified_since(None, modified));
        assert!(!not_modified_since(
            Some("Sun, 06 Nov 1994 08:49:37 GMT"),
            None
        ));
    }

    #[test]
    fn test_cache_policy() {
        assert_eq!(
            CachePolicy::Public(3600).to_header_value(),
            "public, max-age=3600"
        );
        assert_eq!(CachePolicy::NoCache.to_header_value(), "no-cache");
    }
}
