//! HTTP `Range` header parsing for resumable downloads.
//!
//! Only single byte ranges are supported (`bytes=100-199`, `bytes=500-`,
//! `bytes=-200`).  A multi-range request is reported as
//! [`RangeError::Malformed`]; callers ignore malformed headers and answer
//! with the full body, which RFC 9110 permits.

use thiserror::Error;

/// Errors produced while interpreting a `Range` header.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// The header is syntactically invalid or uses an unsupported form.
    /// The request should be served as if no `Range` had been sent.
    #[error("malformed range header: {0}")]
    Malformed(String),

    /// The range lies entirely outside the resource.  Answer `416` with
    /// `Content-Range: bytes */<total>`.
    #[error("range not satisfiable for a {total}-byte resource")]
    Unsatisfiable { total: u64 },
}

/// An inclusive byte range `[start, end]` within a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`: a parsed range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the `Content-Range` header of a `206` response.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// `Content-Range` value for a `416` response.
pub fn unsatisfied_content_range(total: u64) -> String {
    format!("bytes */{total}")
}

/// Parses a `Range` header value against a resource of `total` bytes.
///
/// The end of the range is clamped to the last byte of the resource.
///
/// # Errors
///
/// - [`RangeError::Malformed`] for anything other than a single `bytes=`
///   range, or when the last position precedes the first.
/// - [`RangeError::Unsatisfiable`] when the first position is at or beyond
///   `total`, for a zero-length suffix, or for any range on an empty resource.
///
/// # Example
///
/// ```rust
/// use fei_core::{parse_range_header, ByteRange};
///
/// let range = parse_range_header("bytes=100-199", 1000).unwrap();
/// assert_eq!(range, ByteRange { start: 100, end: 199 });
/// assert_eq!(range.len(), 100);
/// ```
pub fn parse_range_header(header: &str, total: u64) -> Result<ByteRange, RangeError> {
    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| RangeError::Malformed(format!("unsupported unit in '{header}'")))?;

    if spec.contains(',') {
        return Err(RangeError::Malformed("multiple ranges are not supported".into()));
    }

    let (first, last) = spec
        .split_once('-')
        .ok_or_else(|| RangeError::Malformed(format!("missing '-' in '{spec}'")))?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix form: the final `n` bytes.
        let suffix = parse_position(last)?;
        if suffix == 0 || total == 0 {
            return Err(RangeError::Unsatisfiable { total });
        }
        return Ok(ByteRange {
            start: total.saturating_sub(suffix),
            end: total - 1,
        });
    }

    let start = parse_position(first)?;
    if start >= total {
        return Err(RangeError::Unsatisfiable { total });
    }

    let end = if last.is_empty() {
        total - 1
    } else {
        parse_position(last)?.min(total - 1)
    };

    if end < start {
        return Err(RangeError::Malformed(format!(
            "last position {end} precedes first position {start}"
        )));
    }

    Ok(ByteRange { start, end })
}

fn parse_position(raw: &str) -> Result<u64, RangeError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed(format!("invalid position '{raw}'")));
    }
    raw.parse()
        .map_err(|_| RangeError::Malformed(format!("position '{raw}' out of range")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
