//! Chunk-position metadata carried in request headers.
//!
//! Resumable upload widgets describe each chunk with
//! `Content-Range: bytes <start>-<end>/<total>` and name the original file
//! with `Content-Disposition: attachment; filename="<name>"`. Both are
//! parsed here without reference to any HTTP framework.

use percent_encoding::percent_decode_str;

use crate::ProtocolError;

/// Parsed `Content-Range` value. Offsets are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    /// Declared size of the whole file; `None` for `*`.
    pub total: Option<u64>,
}

/// Metadata describing where a chunk sits within its file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkMeta {
    pub range: Option<ContentRange>,
    pub file_name: Option<String>,
}

impl ChunkMeta {
    /// Builds chunk metadata from raw header values.
    ///
    /// A present but unparsable range is an error; a missing or empty
    /// file name is not.
    pub fn from_headers(
        content_range: Option<&str>,
        content_disposition: Option<&str>,
    ) -> Result<Self, ProtocolError> {
        let range = content_range.map(parse_content_range).transpose()?;
        let file_name = content_disposition.and_then(parse_disposition_filename);
        Ok(Self { range, file_name })
    }

    pub fn start(&self) -> Option<u64> {
        self.range.map(|r| r.start)
    }
}

/// Parses `bytes <start>-<end>/<total>` (`bytes=` is accepted too).
///
/// `<total>` may be `*`. Ranges with `start > end`, or ending at or past a
/// known total, are rejected.
pub fn parse_content_range(value: &str) -> Result<ContentRange, ProtocolError> {
    let malformed = || ProtocolError::MalformedRangeHeader(value.to_string());

    let rest = value.trim().strip_prefix("bytes").ok_or_else(malformed)?;
    let rest = match rest.chars().next() {
        Some('=') => &rest[1..],
        Some(c) if c.is_whitespace() => rest,
        _ => return Err(malformed()),
    };

    let (span, total) = rest.trim().split_once('/').ok_or_else(malformed)?;
    let (start, end) = span.split_once('-').ok_or_else(malformed)?;

    let start = parse_offset(start).ok_or_else(malformed)?;
    let end = parse_offset(end).ok_or_else(malformed)?;
    let total = match total.trim() {
        "*" => None,
        t => Some(parse_offset(t).ok_or_else(malformed)?),
    };

    if start > end {
        return Err(malformed());
    }
    if total.is_some_and(|t| end >= t) {
        return Err(malformed());
    }

    Ok(ContentRange { start, end, total })
}

/// Extracts the file name from a `Content-Disposition` value.
///
/// `filename*=` (RFC 5987) wins over `filename=`. The value is unquoted,
/// percent-decoded and reduced to its base name. Returns `None` when no
/// usable name is present.
pub fn parse_disposition_filename(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();

    let raw = if let Some(idx) = lower.find("filename*=") {
        let ext = param_value(&value[idx + "filename*=".len()..]);
        // charset'language'value
        match ext.splitn(3, '\'').nth(2) {
            Some(v) => v.to_string(),
            None => ext,
        }
    } else {
        let idx = lower.find("filename=")?;
        param_value(&value[idx + "filename=".len()..])
    };

    let decoded = percent_decode_str(&raw).decode_utf8_lossy();
    let base = decoded.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() {
        None
    } else {
        Some(base.to_string())
    }
}

/// Returns a parameter value up to its terminator, without quotes.
fn param_value(s: &str) -> String {
    let s = s.trim_start();
    let raw = match s.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => s.split(';').next().unwrap_or_default(),
    };
    raw.trim().replace('"', "")
}

fn parse_offset(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
