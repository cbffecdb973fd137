//! Forward conversion: cell bytes to MySQL literals.
//!
//! Values are bytes end to end, so escaping works per byte and never
//! assumes UTF-8.

/// Escapes a value for a single-quoted INSERT literal: backslash and single
/// quote are backslash-escaped, NUL, LF, CR and Ctrl-Z become `\0`, `\n`,
/// `\r` and `\Z`.
pub fn escape_insert(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 8);
    for &b in value {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            0x00 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
    out
}

/// `'<escaped>'`
pub fn quote_insert(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 10);
    out.push(b'\'');
    out.extend(escape_insert(value));
    out.push(b'\'');
    out
}

/// `mysql_real_escape_string` equivalent, used for UPDATE statements and
/// WHERE values. Both quote characters are escaped, so the result is safe
/// inside `'...'` or `"..."`.
pub fn escape_mimic(value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 8);
    for &b in value {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x00 => out.extend_from_slice(b"\\0"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
    out
}

/// `'<escaped>'` with [`escape_mimic`], for string comparisons in WHERE.
pub fn quote_mimic(value: &[u8]) -> String {
    format!("'{}'", String::from_utf8_lossy(&escape_mimic(value)))
}

/// `UNHEX('<hex>')` for a hex shadow value.
pub fn unhex_literal(hex: &[u8]) -> Vec<u8> {
    let mut out = b"UNHEX('".to_vec();
    out.extend(hex.iter().filter(|b| b.is_ascii_hexdigit()));
    out.extend_from_slice(b"')");
    out
}

/// `b'<bits>'` for a bit shadow value, `NULL` for none.
///
/// The shadow is `col+0`, a decimal number, which is spelled out in binary
/// digits for the literal.
pub fn bit_literal(shadow: Option<&[u8]>) -> Vec<u8> {
    let Some(shadow) = shadow else {
        return b"NULL".to_vec();
    };
    let digits = std::str::from_utf8(shadow)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|n| format!("{n:b}"))
        .unwrap_or_else(|| {
            String::from_utf8_lossy(shadow)
                .chars()
                .filter(|c| matches!(c, '0' | '1'))
                .collect()
        });
    format!("b'{digits}'").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_insert() {
        assert_eq!(
            escape_insert(b"a'b\\c\0d\ne\rf\x1ag\"h"),
            b"a\\'b\\\\c\\0d\\ne\\rf\\Zg\"h".to_vec()
        );
        assert_eq!(quote_insert(b""), b"''".to_vec());
        // Non-UTF-8 bytes pass through.
        assert_eq!(escape_insert(b"\xff\xfe"), b"\xff\xfe".to_vec());
    }

    #[test]
    fn test_escape_mimic() {
        assert_eq!(
            escape_mimic(b"say \"hi\" it's"),
            b"say \\\"hi\\\" it\\'s".to_vec()
        );
        assert_eq!(quote_mimic(b"42"), "'42'");
    }

    #[test]
    fn test_unhex_literal() {
        assert_eq!(
            unhex_literal(b"48656C6C6F"),
            b"UNHEX('48656C6C6F')".to_vec()
        );
        assert_eq!(unhex_literal(b"41');--"), b"UNHEX('41')".to_vec());
    }

    #[test]
    fn test_bit_literal() {
        assert_eq!(bit_literal(None), b"NULL".to_vec());
        assert_eq!(bit_literal(Some(b"1")), b"b'1'".to_vec());
        assert_eq!(bit_literal(Some(b"0")), b"b'0'".to_vec());
        assert_eq!(bit_literal(Some(b"5")), b"b'101'".to_vec());
    }
}
