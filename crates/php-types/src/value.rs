/// Key of an array element or object property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(Vec<u8>),
}

impl ArrayKey {
    pub fn str(key: &str) -> Self {
        ArrayKey::Str(key.as_bytes().to_vec())
    }
}

/// A decoded PHP value.
///
/// Strings are bytes: PHP strings have no encoding and `s:` lengths count
/// bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum PhpValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Float lexeme exactly as written (`1.5`, `1.0E+25`, `INF`, `NAN`).
    Float(String),
    Str(Vec<u8>),
    /// Ordered array with integer and string keys.
    Array(Vec<(ArrayKey, PhpValue)>),
    /// Object with its class name and properties. Protected and private
    /// property names keep their NUL-mangled form.
    Object {
        class: Vec<u8>,
        properties: Vec<(ArrayKey, PhpValue)>,
    },
    /// `C:` payload of a class implementing `Serializable`.
    Custom { class: Vec<u8>, payload: Vec<u8> },
    /// `E:` enum case, `Class:Case`.
    Enum(Vec<u8>),
    /// `r:` (value) or `R:` (reference) back-reference to an earlier slot.
    Reference { by_ref: bool, slot: i64 },
}

impl PhpValue {
    pub fn str(value: &str) -> Self {
        PhpValue::Str(value.as_bytes().to_vec())
    }

    /// Class name for objects and custom payloads.
    pub fn class_name(&self) -> Option<&[u8]> {
        match self {
            PhpValue::Object { class, .. } | PhpValue::Custom { class, .. } => Some(class),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PhpValue::Str(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Looks up a string key in an array or object.
    pub fn get(&self, key: &str) -> Option<&PhpValue> {
        let entries = match self {
            PhpValue::Array(entries) => entries,
            PhpValue::Object { properties, .. } => properties,
            _ => return None,
        };
        entries
            .iter()
            .find(|(k, _)| matches!(k, ArrayKey::Str(s) if s == key.as_bytes()))
            .map(|(_, v)| v)
    }
}
