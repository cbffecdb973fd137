use php_types::{is_serialized, serialize, unserialize, ArrayKey, PhpValue};
use serde_json::Value;
use std::collections::HashSet;
use sync_core::MigrationContext;
use tracing::warn;

use crate::error::EncodingError;
use crate::json;
use crate::rewriter::Rewriter;

/// Deepest container nesting the codec walks before giving up on a value.
pub const MAX_DEPTH: usize = 512;

/// Classes whose instances cannot be cloned or re-serialized faithfully.
const NON_RESERIALIZABLE: [&[u8]; 2] = [b"DateInterval", b"DatePeriod"];

/// Which serialized object classes may be rewritten.
///
/// An object of a class the destination cannot instantiate would decode as
/// an incomplete-class placeholder, so the codec leaves the whole payload
/// untouched instead.
#[derive(Debug, Clone, Default)]
pub enum ClassPolicy {
    #[default]
    AllowAll,
    Allow(HashSet<Vec<u8>>),
}

impl ClassPolicy {
    pub fn from_context(context: &MigrationContext) -> Self {
        match &context.known_classes {
            None => ClassPolicy::AllowAll,
            Some(classes) => ClassPolicy::Allow(
                classes
                    .iter()
                    .map(|c| c.to_ascii_lowercase().into_bytes())
                    .collect(),
            ),
        }
    }

    pub fn allows(&self, class: &[u8]) -> bool {
        match self {
            ClassPolicy::AllowAll => true,
            ClassPolicy::Allow(classes) => {
                class.eq_ignore_ascii_case(b"stdClass")
                    || classes.contains(&class.to_ascii_lowercase())
            }
        }
    }
}

enum Shape {
    Serialized(PhpValue),
    Json(Value),
    Scalar,
}

fn classify(data: &[u8]) -> Shape {
    if is_serialized(data) {
        if let Ok(value) = unserialize(data) {
            return Shape::Serialized(value);
        }
    }
    match json::decode_structured(data) {
        Some(value) => Shape::Json(value),
        None => Shape::Scalar,
    }
}

/// Walks one cell value and rewrites every string inside it.
///
/// Serialized payloads and JSON blobs are decoded, rewritten recursively and
/// re-encoded, so byte lengths and escaping stay consistent. A value in
/// which nothing was rewritten is returned byte-for-byte as it came in.
pub struct ValueCodec {
    rewriter: Rewriter,
    classes: ClassPolicy,
    rewrites: usize,
}

impl ValueCodec {
    pub fn new(rewriter: Rewriter, classes: ClassPolicy) -> Self {
        Self {
            rewriter,
            classes,
            rewrites: 0,
        }
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    pub fn set_column(&mut self, column: &str) {
        self.rewriter.set_column(column);
    }

    /// Rewrites `data`. Never fails: a value that cannot be re-encoded is
    /// logged and returned unchanged.
    pub fn transform(&mut self, data: &[u8]) -> Vec<u8> {
        match self.transform_bytes(data, 0) {
            Ok(out) => out,
            Err(e) => {
                warn!(
                    table = self.rewriter.table(),
                    column = self.rewriter.column(),
                    "Failed attempting to do the recursive unserialize replace: {e}\n{}",
                    preview(data)
                );
                data.to_vec()
            }
        }
    }

    fn transform_bytes(&mut self, data: &[u8], depth: usize) -> Result<Vec<u8>, EncodingError> {
        if depth > MAX_DEPTH {
            return Err(EncodingError::TooDeep(MAX_DEPTH));
        }
        // Option values holding back-references can expand without bound.
        if self.in_option_value() && is_serialized(data) && has_back_reference(data) {
            return Ok(data.to_vec());
        }

        let before = self.rewrites;
        let out = match classify(data) {
            Shape::Serialized(value) => {
                match &value {
                    PhpValue::Object { class, .. } if !self.may_rewrite_object(class) => {
                        return Ok(data.to_vec());
                    }
                    PhpValue::Custom { .. } => return Ok(data.to_vec()),
                    _ => {}
                }
                let value = self.transform_php(value, depth + 1)?;
                serialize(&value)
            }
            Shape::Json(value) => {
                let value = self.transform_json(value, depth + 1)?;
                json::encode_value(&value).into_bytes()
            }
            Shape::Scalar => {
                let out = self.rewriter.apply(data);
                if out != data {
                    self.rewrites += 1;
                }
                return Ok(out);
            }
        };
        if self.rewrites == before {
            return Ok(data.to_vec());
        }
        Ok(out)
    }

    fn transform_php(&mut self, value: PhpValue, depth: usize) -> Result<PhpValue, EncodingError> {
        if depth > MAX_DEPTH {
            return Err(EncodingError::TooDeep(MAX_DEPTH));
        }
        match value {
            PhpValue::Str(bytes) => Ok(PhpValue::Str(self.transform_bytes(&bytes, depth)?)),
            PhpValue::Array(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push((key, self.transform_php(value, depth + 1)?));
                }
                Ok(PhpValue::Array(out))
            }
            PhpValue::Object { class, properties } => {
                if !self.may_rewrite_object(&class) {
                    return Ok(PhpValue::Object { class, properties });
                }
                let mut out = Vec::with_capacity(properties.len());
                for (key, value) in properties {
                    let value = match key {
                        // Integer-named properties are not addressable on a
                        // PHP object and pass through untouched.
                        ArrayKey::Int(_) => value,
                        ArrayKey::Str(_) => self.transform_php(value, depth + 1)?,
                    };
                    out.push((key, value));
                }
                Ok(PhpValue::Object {
                    class,
                    properties: out,
                })
            }
            other => Ok(other),
        }
    }

    fn transform_json(&mut self, value: Value, depth: usize) -> Result<Value, EncodingError> {
        if depth > MAX_DEPTH {
            return Err(EncodingError::TooDeep(MAX_DEPTH));
        }
        match value {
            Value::String(s) => {
                let out = self.transform_bytes(s.as_bytes(), depth)?;
                String::from_utf8(out)
                    .map(Value::String)
                    .map_err(|_| EncodingError::InvalidUtf8)
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.transform_json(item, depth + 1)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    out.insert(key, self.transform_json(item, depth + 1)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        }
    }

    fn may_rewrite_object(&self, class: &[u8]) -> bool {
        if NON_RESERIALIZABLE
            .iter()
            .any(|c| c.eq_ignore_ascii_case(class))
        {
            return false;
        }
        if !self.classes.allows(class) {
            warn!(
                table = self.rewriter.table(),
                column = self.rewriter.column(),
                "Failed to instantiate object for replacement. If the serialized object's \
                 class is defined by a plugin, enable that plugin for migration requests. \
                 Class Name: {}",
                String::from_utf8_lossy(class)
            );
            return false;
        }
        true
    }

    fn in_option_value(&self) -> bool {
        self.rewriter.column() == "option_value" && self.rewriter.table_is("options")
    }
}

/// `r:<digits>` or `R:<digits>` anywhere in the payload.
fn has_back_reference(data: &[u8]) -> bool {
    data.windows(3)
        .any(|w| matches!(w[0], b'r' | b'R') && w[1] == b':' && w[2].is_ascii_digit())
}

fn preview(data: &[u8]) -> String {
    const LIMIT: usize = 512;
    let shown = String::from_utf8_lossy(&data[..data.len().min(LIMIT)]);
    if data.len() > LIMIT {
        format!("{shown}... ({} bytes)", data.len())
    } else {
        shown.into_owned()
    }
}
