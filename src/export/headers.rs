//! Synthetic HTTP response reconstruction.
//!
//! Stored versions carry a captured header map but no status line, so a
//! plausible one is rebuilt before the record is framed. The heuristic is
//! deliberately simple: a version with a `Location` header is assumed to
//! have been a redirect, anything else a 200. A genuinely failed capture
//! is therefore re-reported as 200; this lossiness is a compatibility
//! commitment, not an accident.

use crate::models::ContentVersion;
use crate::utils::recase_header_name;

/// Headers carrying this prefix are daemon-internal bookkeeping and are
/// never re-exported.
pub const INTERNAL_HEADER_PREFIX: &str = "x-conserv-";

/// Reconstruct the status line for a stored version.
pub fn status_line(version: &dyn ContentVersion) -> &'static str {
    if version.header("location").is_some() {
        "HTTP/1.1 302 Found"
    } else {
        "HTTP/1.1 200 OK"
    }
}

/// Build the full synthetic response head: status line, filtered and
/// re-cased headers, terminated by the CRLF blank line separating head
/// from body. Returned as bytes so declared record lengths can be
/// computed exactly.
pub fn response_head(version: &dyn ContentVersion) -> Vec<u8> {
    let mut head = String::new();
    head.push_str(status_line(version));
    head.push_str("\r\n");

    for (name, value) in version.headers() {
        // Byte-wise prefix compare; names are not guaranteed ASCII.
        let is_internal = name
            .as_bytes()
            .get(..INTERNAL_HEADER_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(INTERNAL_HEADER_PREFIX.as_bytes()));
        if is_internal {
            continue;
        }
        head.push_str(&recase_header_name(name));
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }

    head.push_str("\r\n");
    head.into_bytes()
}

/// Strip charset and other parameters from a stored content type.
pub fn strip_params(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryVersion;

    #[test]
    fn status_defaults_to_200() {
        let v = MemoryVersion::new("https://example.com/a", b"x".to_vec());
        assert_eq!(status_line(&v), "HTTP/1.1 200 OK");
    }

    #[test]
    fn location_header_switches_to_302() {
        let v = MemoryVersion::new("https://example.com/a", b"x".to_vec())
            .with_header("Location", "https://example.com/b");
        assert_eq!(status_line(&v), "HTTP/1.1 302 Found");
    }

    #[test]
    fn head_recases_and_terminates_with_blank_line() {
        let v = MemoryVersion::new("https://example.com/a", b"x".to_vec())
            .with_header("content-type", "text/html");
        let head = String::from_utf8(response_head(&v)).unwrap();
        assert_eq!(
            head,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n"
        );
    }

    #[test]
    fn internal_headers_are_dropped() {
        let v = MemoryVersion::new("https://example.com/a", b"x".to_vec())
            .with_header("X-Conserv-Repair", "true")
            .with_header("x-conserv-checksum", "abc")
            .with_header("Server", "nginx");
        let head = String::from_utf8(response_head(&v)).unwrap();
        assert!(!head.contains("Conserv"));
        assert!(!head.contains("checksum"));
        assert!(head.contains("Server: nginx\r\n"));
    }

    #[test]
    fn multibyte_header_names_are_kept() {
        // A non-ASCII name whose prefix-length byte index falls inside a
        // multi-byte character must not abort header synthesis.
        let v = MemoryVersion::new("https://example.com/a", b"x".to_vec())
            .with_header("x-served-é", "edge")
            .with_header("été", "summer");
        let head = String::from_utf8(response_head(&v)).unwrap();
        assert!(head.contains(": edge\r\n"));
        assert!(head.contains(": summer\r\n"));
    }

    #[test]
    fn strip_params_removes_charset() {
        assert_eq!(strip_params("text/html; charset=UTF-8"), "text/html");
        assert_eq!(strip_params("application/pdf"), "application/pdf");
        assert_eq!(strip_params(" text/plain ;x=y"), "text/plain");
    }
}
