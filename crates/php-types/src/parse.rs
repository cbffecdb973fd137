use thiserror::Error;

use crate::value::{ArrayKey, PhpValue};

/// Nesting limit, matching PHP's default `unserialize_max_depth`.
pub const MAX_DEPTH: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    #[error("expected {expected} at offset {offset}")]
    Expected {
        expected: &'static str,
        offset: usize,
    },

    #[error("unknown type tag {tag:?} at offset {offset}")]
    UnknownTag { tag: char, offset: usize },

    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),

    #[error("{0} trailing bytes after value")]
    TrailingData(usize),

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// Decodes one complete serialized value.
///
/// The whole input must be consumed; trailing bytes are an error so that
/// re-encoding never silently drops data.
pub fn unserialize(input: &[u8]) -> Result<PhpValue, ParseError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != input.len() {
        return Err(ParseError::TrailingData(input.len() - parser.pos));
    }
    Ok(value)
}

/// Strips the characters PHP's `trim()` removes by default.
pub fn trim(data: &[u8]) -> &[u8] {
    const WS: &[u8] = b" \t\n\r\0\x0B";
    let start = data.iter().position(|b| !WS.contains(b)).unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !WS.contains(b))
        .map_or(start, |i| i + 1);
    &data[start..end]
}

/// WordPress' strict `is_serialized()` check, extended to `C:` payloads.
///
/// This is a cheap shape test. A `true` result does not guarantee that
/// [`unserialize`] succeeds.
pub fn is_serialized(data: &[u8]) -> bool {
    let data = trim(data);
    if data == b"N;" {
        return true;
    }
    if data.len() < 4 || data[1] != b':' {
        return false;
    }
    let last = data[data.len() - 1];
    if last != b';' && last != b'}' {
        return false;
    }
    match data[0] {
        b's' => data[data.len() - 2] == b'"' && digits_then_colon(&data[2..]),
        b'a' | b'O' | b'E' | b'C' => digits_then_colon(&data[2..]),
        b'b' | b'i' | b'd' => {
            let body = &data[2..data.len() - 1];
            last == b';'
                && !body.is_empty()
                && body
                    .iter()
                    .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'E' | b'+' | b'-'))
        }
        _ => false,
    }
}

fn digits_then_colon(data: &[u8]) -> bool {
    let digits = data.iter().take_while(|b| b.is_ascii_digit()).count();
    digits > 0 && data.get(digits) == Some(&b':')
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.input.len())
            .ok_or(ParseError::UnexpectedEnd(self.input.len()))?;
        let bytes = &self.input[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), ParseError> {
        let offset = self.pos;
        match self.take(1)? {
            [b] if *b == byte => Ok(()),
            _ => Err(ParseError::Expected { expected, offset }),
        }
    }

    /// Bytes up to `stop`, consuming the stop byte.
    fn until(&mut self, stop: u8) -> Result<&'a [u8], ParseError> {
        let rest = &self.input[self.pos..];
        let len = rest
            .iter()
            .position(|b| *b == stop)
            .ok_or(ParseError::UnexpectedEnd(self.input.len()))?;
        let bytes = &rest[..len];
        self.pos += len + 1;
        Ok(bytes)
    }

    fn integer(&mut self, stop: u8) -> Result<i64, ParseError> {
        let offset = self.pos;
        let digits = self.until(stop)?;
        let unsigned = match digits {
            [b'+' | b'-', rest @ ..] => rest,
            _ => digits,
        };
        if unsigned.is_empty() || !unsigned.iter().all(u8::is_ascii_digit) {
            return Err(ParseError::InvalidNumber(offset));
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(ParseError::InvalidNumber(offset))
    }

    fn length(&mut self, stop: u8) -> Result<usize, ParseError> {
        let offset = self.pos;
        let digits = self.until(stop)?;
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(ParseError::InvalidNumber(offset));
        }
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(ParseError::InvalidNumber(offset))
    }

    fn float(&mut self) -> Result<String, ParseError> {
        let offset = self.pos;
        let lexeme = self.until(b';')?;
        let valid = match lexeme {
            b"INF" | b"-INF" | b"NAN" => true,
            _ => {
                !lexeme.is_empty()
                    && lexeme
                        .iter()
                        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
                    && std::str::from_utf8(lexeme)
                        .map(|s| s.parse::<f64>().is_ok())
                        .unwrap_or(false)
            }
        };
        if !valid {
            return Err(ParseError::InvalidNumber(offset));
        }
        Ok(String::from_utf8_lossy(lexeme).into_owned())
    }

    /// `<len>:"<bytes>"`
    fn quoted(&mut self) -> Result<&'a [u8], ParseError> {
        let len = self.length(b':')?;
        self.expect(b'"', "opening quote")?;
        let bytes = self.take(len)?;
        self.expect(b'"', "closing quote")?;
        Ok(bytes)
    }

    fn value(&mut self, depth: usize) -> Result<PhpValue, ParseError> {
        if depth > MAX_DEPTH {
            return Err(ParseError::TooDeep(MAX_DEPTH));
        }
        let offset = self.pos;
        let tag = self.take(1)?[0];
        if tag == b'N' {
            self.expect(b';', "';'")?;
            return Ok(PhpValue::Null);
        }
        self.expect(b':', "':'")?;

        let value = match tag {
            b'b' => {
                let flag = self.take(1)?[0];
                self.expect(b';', "';'")?;
                match flag {
                    b'0' => PhpValue::Bool(false),
                    b'1' => PhpValue::Bool(true),
                    _ => {
                        return Err(ParseError::Expected {
                            expected: "0 or 1",
                            offset: offset + 2,
                        })
                    }
                }
            }
            b'i' => PhpValue::Int(self.integer(b';')?),
            b'd' => PhpValue::Float(self.float()?),
            b's' => {
                let bytes = self.quoted()?;
                self.expect(b';', "';'")?;
                PhpValue::Str(bytes.to_vec())
            }
            b'a' => {
                let count = self.length(b':')?;
                self.expect(b'{', "'{'")?;
                let entries = self.entries(count, depth)?;
                self.expect(b'}', "'}'")?;
                PhpValue::Array(entries)
            }
            b'O' => {
                let class = self.quoted()?.to_vec();
                self.expect(b':', "':'")?;
                let count = self.length(b':')?;
                self.expect(b'{', "'{'")?;
                let properties = self.entries(count, depth)?;
                self.expect(b'}', "'}'")?;
                PhpValue::Object { class, properties }
            }
            b'C' => {
                let class = self.quoted()?.to_vec();
                self.expect(b':', "':'")?;
                let len = self.length(b':')?;
                self.expect(b'{', "'{'")?;
                let payload = self.take(len)?.to_vec();
                self.expect(b'}', "'}'")?;
                PhpValue::Custom { class, payload }
            }
            b'E' => {
                let case = self.quoted()?.to_vec();
                self.expect(b';', "';'")?;
                PhpValue::Enum(case)
            }
            b'r' | b'R' => PhpValue::Reference {
                by_ref: tag == b'R',
                slot: self.integer(b';')?,
            },
            other => {
                return Err(ParseError::UnknownTag {
                    tag: other as char,
                    offset,
                })
            }
        };
        Ok(value)
    }

    fn entries(
        &mut self,
        count: usize,
        depth: usize,
    ) -> Result<Vec<(ArrayKey, PhpValue)>, ParseError> {
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value(depth + 1)?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    fn key(&mut self) -> Result<ArrayKey, ParseError> {
        let offset = self.pos;
        let tag = self.take(1)?[0];
        self.expect(b':', "':'")?;
        match tag {
            b'i' => Ok(ArrayKey::Int(self.integer(b';')?)),
            b's' => {
                let bytes = self.quoted()?;
                self.expect(b';', "';'")?;
                Ok(ArrayKey::Str(bytes.to_vec()))
            }
            _ => Err(ParseError::Expected {
                expected: "integer or string key",
                offset,
            }),
        }
    }
}
