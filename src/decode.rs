//! Extraction of a JSON value from free-form response text.
//!
//! The generation service is instructed to return bare JSON but routinely
//! wraps it in prose or fenced code blocks anyway. The decoder treats that
//! wrapping as expected input: it locates the outermost JSON object or array
//! span and parses only that span.

use serde_json::Value;

use crate::error::DecodeError;

/// Locate and parse the outermost JSON object or array in `raw_text`.
///
/// Leading and trailing non-JSON text is ignored. The result is an untyped
/// value tree; schema validation happens downstream.
pub fn decode(raw_text: &str) -> Result<Value, DecodeError> {
    let span = locate_json_span(raw_text).ok_or(DecodeError::NoJsonFound)?;

    serde_json::from_str(span).map_err(|e| DecodeError::MalformedJson {
        position: offset_of(raw_text, span, e.line(), e.column()),
        detail: e.to_string(),
    })
}

/// Slice from the earliest opening delimiter to the matching kind's last
/// closing delimiter. Whichever of `{` or `[` appears first wins, so a prose
/// preamble containing neither cannot shadow the payload.
fn locate_json_span(raw: &str) -> Option<&str> {
    let obj_start = raw.find('{');
    let arr_start = raw.find('[');

    let (start, close) = match (obj_start, arr_start) {
        (Some(o), Some(a)) if a < o => (a, ']'),
        (Some(o), _) => (o, '}'),
        (None, Some(a)) => (a, ']'),
        (None, None) => return None,
    };

    let end = raw.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Translate serde_json's 1-based line/column within the span back to a byte
/// offset within the original text, for diagnostics.
fn offset_of(raw: &str, span: &str, line: usize, column: usize) -> usize {
    let span_start = span.as_ptr() as usize - raw.as_ptr() as usize;
    let line_start: usize = span
        .lines()
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    span_start + line_start + column.saturating_sub(1)
}
