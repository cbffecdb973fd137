use crate::value::{ArrayKey, PhpValue};

/// Encodes `value` in PHP's native serialization format.
pub fn serialize(value: &PhpValue) -> Vec<u8> {
    let mut out = Vec::new();
    serialize_into(value, &mut out);
    out
}

pub fn serialize_into(value: &PhpValue, out: &mut Vec<u8>) {
    match value {
        PhpValue::Null => out.extend_from_slice(b"N;"),
        PhpValue::Bool(b) => out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" }),
        PhpValue::Int(i) => {
            out.extend_from_slice(format!("i:{i};").as_bytes());
        }
        PhpValue::Float(lexeme) => {
            out.extend_from_slice(format!("d:{lexeme};").as_bytes());
        }
        PhpValue::Str(bytes) => {
            out.extend_from_slice(b"s:");
            quoted(bytes, out);
            out.push(b';');
        }
        PhpValue::Array(entries) => {
            out.extend_from_slice(format!("a:{}:{{", entries.len()).as_bytes());
            write_entries(entries, out);
            out.push(b'}');
        }
        PhpValue::Object { class, properties } => {
            out.extend_from_slice(b"O:");
            quoted(class, out);
            out.extend_from_slice(format!(":{}:{{", properties.len()).as_bytes());
            write_entries(properties, out);
            out.push(b'}');
        }
        PhpValue::Custom { class, payload } => {
            out.extend_from_slice(b"C:");
            quoted(class, out);
            out.extend_from_slice(format!(":{}:{{", payload.len()).as_bytes());
            out.extend_from_slice(payload);
            out.push(b'}');
        }
        PhpValue::Enum(case) => {
            out.extend_from_slice(b"E:");
            quoted(case, out);
            out.push(b';');
        }
        PhpValue::Reference { by_ref, slot } => {
            let tag = if *by_ref { 'R' } else { 'r' };
            out.extend_from_slice(format!("{tag}:{slot};").as_bytes());
        }
    }
}

fn quoted(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(format!("{}:\"", bytes.len()).as_bytes());
    out.extend_from_slice(bytes);
    out.push(b'"');
}

fn write_entries(entries: &[(ArrayKey, PhpValue)], out: &mut Vec<u8>) {
    for (key, value) in entries {
        match key {
            ArrayKey::Int(i) => out.extend_from_slice(format!("i:{i};").as_bytes()),
            ArrayKey::Str(s) => {
                out.extend_from_slice(b"s:");
                quoted(s, out);
                out.push(b';');
            }
        }
        serialize_into(value, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unserialize;

    #[test]
    fn test_string_length_is_recomputed() {
        let value = PhpValue::Array(vec![(
            ArrayKey::str("siteurl"),
            PhpValue::str("https://new.example.com"),
        )]);
        assert_eq!(
            serialize(&value),
            b"a:1:{s:7:\"siteurl\";s:23:\"https://new.example.com\";}".to_vec()
        );
    }

    #[test]
    fn test_reencoding_is_byte_exact() {
        let payloads: &[&[u8]] = &[
            b"N;",
            b"b:0;",
            b"i:-7;",
            b"d:1.0E+25;",
            b"d:NAN;",
            b"s:0:\"\";",
            b"a:3:{i:0;s:1:\"a\";s:1:\"b\";d:0.5;i:9;N;}",
            b"O:8:\"stdClass\":1:{s:3:\"\0*\0\";i:1;}",
            b"a:1:{s:4:\"list\";C:11:\"ArrayObject\":21:{x:i:0;a:0:{};m:a:0:{}}}",
            b"a:2:{i:0;O:8:\"stdClass\":0:{}i:1;r:2;}",
            b"E:11:\"Suit:Hearts\";",
            b"s:6:\"\xff\xfe\x00abc\";",
        ];
        for payload in payloads {
            let value = unserialize(payload).unwrap();
            assert_eq!(&serialize(&value)[..], *payload);
        }
    }
}
