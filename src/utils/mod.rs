//! Small pure helpers shared across the export pipelines.

use chrono::{DateTime, Utc};

/// Replace embedded tabs, carriage returns and newlines with spaces so
/// that one logical record always serializes to exactly one line.
pub fn blank_out_nls_and_tabs(s: &str) -> String {
    s.replace(['\t', '\r', '\n'], " ")
}

/// Format a timestamp as the 14-digit `yyyyMMddHHmmss` form used in
/// archive segment names and report file names.
pub fn timestamp14(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d%H%M%S").to_string()
}

/// Re-case a header name to conventional HTTP capitalization:
/// the first letter and every letter following a hyphen are upper-cased,
/// everything else lower-cased ("content-TYPE" becomes "Content-Type").
pub fn recase_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' {
            out.push('-');
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blank_out_nls_and_tabs() {
        assert_eq!(blank_out_nls_and_tabs("a\tb\nc\rd"), "a b c d");
        assert_eq!(blank_out_nls_and_tabs("plain"), "plain");
        assert_eq!(blank_out_nls_and_tabs(""), "");
    }

    #[test]
    fn test_timestamp14() {
        let t = Utc.with_ymd_and_hms(2014, 3, 5, 17, 8, 9).unwrap();
        assert_eq!(timestamp14(t), "20140305170809");
        assert_eq!(timestamp14(t).len(), 14);
    }

    #[test]
    fn test_recase_header_name() {
        assert_eq!(recase_header_name("content-type"), "Content-Type");
        assert_eq!(recase_header_name("LOCATION"), "Location");
        assert_eq!(recase_header_name("x-frame-options"), "X-Frame-Options");
        assert_eq!(recase_header_name("etag"), "Etag");
    }
}
