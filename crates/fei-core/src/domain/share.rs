//! Shared items and the share log.
//!
//! A shared item is identified by an opaque *locator*: either a filesystem
//! path or a URI such as `file:///sdcard/a.pdf` or `content://provider/42`.
//! Locators granted by the user are persisted one per line in a plain-text
//! log.  The log is append-only from the user's point of view; the registry
//! rewrites it with only the entries that still resolve, which heals it from
//! stale or garbage lines.
//!
//! # Log format
//!
//! ```text
//! /home/me/Pictures/cat.png
//! file:///home/me/Documents/notes.txt
//! content://com.example.provider/document/42
//! ```
//!
//! Blank lines and surrounding whitespace are ignored.  No deduplication is
//! performed: the same locator may appear more than once and is then listed
//! more than once.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the published snapshot.
///
/// Serialised as `{"uri": "...", "name": "..."}` for the `/shares` listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedFileInfo {
    #[serde(rename = "uri")]
    pub locator: String,
    #[serde(rename = "name")]
    pub display_name: String,
}

impl SharedFileInfo {
    pub fn new(locator: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            display_name: display_name.into(),
        }
    }
}

/// Why a log line could not be interpreted as a locator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("locator is empty")]
    Empty,
    #[error("locator contains control characters")]
    ControlCharacter,
    #[error("locator '{0}' is neither an absolute path nor a URI")]
    NotAbsolute(String),
    #[error("locator '{0}' has an invalid URI scheme")]
    InvalidScheme(String),
}

/// A parsed locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// An absolute filesystem path (plain or from a `file://` URI).
    Path(PathBuf),
    /// Any other URI; resolving it is up to a platform content provider.
    Uri { scheme: String, rest: String },
}

impl Locator {
    /// Returns the filesystem path for path-backed locators.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Locator::Path(path) => Some(path),
            Locator::Uri { .. } => None,
        }
    }
}

/// Parses one locator string.
///
/// # Errors
///
/// Returns a [`LocatorError`] for empty strings, strings containing control
/// characters, relative paths, and URIs whose scheme is not
/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
///
/// # Example
///
/// ```rust
/// use fei_core::{parse_locator, Locator};
///
/// let loc = parse_locator("file:///tmp/a.txt").unwrap();
/// assert_eq!(loc, Locator::Path("/tmp/a.txt".into()));
/// ```
pub fn parse_locator(raw: &str) -> Result<Locator, LocatorError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LocatorError::Empty);
    }
    if raw.chars().any(char::is_control) {
        return Err(LocatorError::ControlCharacter);
    }

    if let Some((scheme, rest)) = raw.split_once("://") {
        if !is_valid_scheme(scheme) {
            return Err(LocatorError::InvalidScheme(raw.to_string()));
        }
        if scheme.eq_ignore_ascii_case("file") {
            let path = PathBuf::from(rest);
            if !rest.starts_with('/') {
                return Err(LocatorError::NotAbsolute(raw.to_string()));
            }
            return Ok(Locator::Path(path));
        }
        return Ok(Locator::Uri {
            scheme: scheme.to_ascii_lowercase(),
            rest: rest.to_string(),
        });
    }

    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(Locator::Path(path))
    } else {
        Err(LocatorError::NotAbsolute(raw.to_string()))
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Splits log contents into locator strings, skipping blank lines.
pub fn parse_share_log(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Renders locators back into log form, one per line with a trailing newline.
pub fn render_share_log<S: AsRef<str>>(locators: &[S]) -> String {
    let mut out = String::new();
    for locator in locators {
        out.push_str(locator.as_ref());
        out.push('\n');
    }
    out
}

/// Drops every line equal to `locator` and returns the remaining lines.
pub fn without_locator(lines: Vec<String>, locator: &str) -> Vec<String> {
    lines.into_iter().filter(|line| line != locator).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_file_info_serializes_as_uri_and_name() {
        let info = SharedFileInfo::new("/tmp/a.txt", "a.txt");
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"uri":"/tmp/a.txt","name":"a.txt"}"#);
    }

    #[test]
    fn test_parse_absolute_path() {
        assert_eq!(
            parse_locator("/srv/share/movie.mkv"),
            Ok(Locator::Path("/srv/share/movie.mkv".into()))
        );
    }

    #[test]
    fn test_parse_file_uri_becomes_path() {
        let loc = parse_locator("FILE:///srv/x.bin").unwrap();
        assert_eq!(loc.as_path(), Some(Path::new("/srv/x.bin")));
    }

    #[test]
    fn test_parse_content_uri_keeps_scheme() {
        // Arrange / Act
        let loc = parse_locator("content://com.example.provider/doc/42").unwrap();

        // Assert
        assert_eq!(
            loc,
            Locator::Uri {
                scheme: "content".into(),
                rest: "com.example.provider/doc/42".into()
            }
        );
        assert!(loc.as_path().is_none());
    }

    #[test]
    fn test_parse_rejects_relative_path() {
        assert!(matches!(
            parse_locator("docs/readme.md"),
            Err(LocatorError::NotAbsolute(_))
        ));
    }

    #[test]
    fn test_parse_rejects_relative_file_uri() {
        assert!(matches!(
            parse_locator("file://relative/x"),
            Err(LocatorError::NotAbsolute(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_scheme() {
        assert!(matches!(
            parse_locator("1http://x"),
            Err(LocatorError::InvalidScheme(_))
        ));
        assert!(matches!(
            parse_locator("://x"),
            Err(LocatorError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_and_control_characters() {
        assert_eq!(parse_locator("   "), Err(LocatorError::Empty));
        assert_eq!(
            parse_locator("/tmp/a\u{7}b"),
            Err(LocatorError::ControlCharacter)
        );
    }

    #[test]
    fn test_parse_share_log_skips_blank_lines_and_trims() {
        let lines = parse_share_log("/a\n\n   \n  /b  \r\n/a\n");
        assert_eq!(lines, vec!["/a", "/b", "/a"]);
    }

    #[test]
    fn test_render_share_log_writes_one_line_per_locator() {
        assert_eq!(render_share_log(&["/a", "content://x/1"]), "/a\ncontent://x/1\n");
        assert_eq!(render_share_log::<&str>(&[]), "");
    }

    #[test]
    fn test_without_locator_removes_every_duplicate() {
        let lines = vec!["/a".to_string(), "/b".to_string(), "/a".to_string()];
        assert_eq!(without_locator(lines, "/a"), vec!["/b".to_string()]);
    }
}
