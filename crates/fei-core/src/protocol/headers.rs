//! Header values used when streaming a shared file.

/// Strong entity tag derived from a file's last-modified time and size.
///
/// The tag changes whenever the file is rewritten, so a browser resuming a
/// download with `If-Range` never stitches bytes from two different versions.
pub fn entity_tag(last_modified_ms: u64, size: u64) -> String {
    format!("\"{last_modified_ms:x}-{size:x}\"")
}

/// Returns `true` when an `If-Range` header value allows the range to apply.
///
/// Only strong tags compare equal; weak tags (`W/"..."`) and HTTP dates never
/// match, which makes the server fall back to a full `200` response.
pub fn if_range_matches(if_range: &str, current_tag: &str) -> bool {
    let candidate = if_range.trim();
    !candidate.starts_with("W/") && candidate == current_tag
}

/// `Content-Disposition` value that makes browsers save the body as
/// `display_name`.
///
/// The quoted `filename` parameter carries an ASCII-only fallback; the
/// `filename*` parameter carries the exact UTF-8 name, percent-encoded as
/// described in RFC 5987.
pub fn content_disposition(display_name: &str) -> String {
    let fallback: String = display_name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        percent_encode_attr(display_name)
    )
}

/// Percent-encodes everything outside the RFC 5987 `attr-char` set.
fn percent_encode_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'!' | b'#' | b'$' | b'&' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
            );
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_tag_is_quoted_hex() {
        assert_eq!(entity_tag(255, 16), "\"ff-10\"");
    }

    #[test]
    fn test_entity_tag_changes_with_mtime() {
        assert_ne!(entity_tag(1, 100), entity_tag(2, 100));
    }

    #[test]
    fn test_if_range_matches_identical_strong_tag() {
        let tag = entity_tag(10, 20);
        assert!(if_range_matches(&format!(" {tag} "), &tag));
    }

    #[test]
    fn test_if_range_rejects_weak_tag_and_dates() {
        let tag = entity_tag(10, 20);
        assert!(!if_range_matches(&format!("W/{tag}"), &tag));
        assert!(!if_range_matches("Wed, 21 Oct 2015 07:28:00 GMT", &tag));
    }

    #[test]
    fn test_content_disposition_plain_ascii_name() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn test_content_disposition_escapes_quotes_and_unicode() {
        // Arrange
        let name = "a \"b\" é.txt";

        // Act
        let header = content_disposition(name);

        // Assert
        assert!(header.contains("filename=\"a _b_ _.txt\""));
        assert!(header.contains("filename*=UTF-8''a%20%22b%22%20%C3%A9.txt"));
    }
}
