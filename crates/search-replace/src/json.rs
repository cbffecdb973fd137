//! JSON encoding compatible with PHP's `json_encode` default flags.
//!
//! WordPress block markup and many plugins store JSON produced by PHP, which
//! escapes `/` and every non-ASCII character. Search terms are matched
//! against that form, and rewritten blobs are written back in it.

use serde_json::Value;
use std::fmt::Write;

/// Appends `s` as a quoted JSON string.
pub fn encode_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7f => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04x}", unit);
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Encodes a decoded JSON document.
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => encode_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

/// The JSON-escaped form of a search or replace term, without the
/// surrounding quotes. Bytes that are not valid UTF-8 cannot be JSON-encoded
/// and give an empty term, which never matches.
pub fn json_encode_trim(term: &[u8]) -> Vec<u8> {
    let Ok(term) = std::str::from_utf8(term) else {
        return Vec::new();
    };
    let mut encoded = String::with_capacity(term.len() + 2);
    encode_string(term, &mut encoded);
    encoded.trim_matches('"').as_bytes().to_vec()
}

/// Decodes `data` when it is a JSON object or array.
///
/// Scalars such as `"123"` or `true` are plain strings as far as the
/// rewriter is concerned.
pub fn decode_structured(data: &[u8]) -> Option<Value> {
    let first = data.iter().find(|b| !b.is_ascii_whitespace())?;
    if *first != b'{' && *first != b'[' {
        return None;
    }
    match serde_json::from_slice::<Value>(data) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}
