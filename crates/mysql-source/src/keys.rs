//! Last-seen primary key values of a table being paged.

use mysql_types::forward::quote_mimic;
use mysql_types::TableStructure;
use php_types::{serialize, trim, unserialize, ArrayKey, PhpValue};
use sync_core::Row;
use tracing::warn;

/// Ordered primary key columns with the values of the last row counted.
///
/// Persisted between steps as a PHP-serialized array, so a token written by
/// one step is exactly what the next one reads back.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyState {
    keys: Vec<(String, PhpValue)>,
    first_select: bool,
}

impl PrimaryKeyState {
    /// Fresh state for a table: every key at `0`, no rows seen yet.
    pub fn from_structure(structure: &TableStructure) -> Self {
        Self {
            keys: structure
                .primary_keys
                .iter()
                .map(|pk| (pk.clone(), PhpValue::Int(0)))
                .collect(),
            first_select: true,
        }
    }

    /// Applies the `primary_keys` value of a resume token.
    ///
    /// A non-empty snapshot replaces the derived keys and means paging
    /// continues after the stored tuple. A snapshot that does not decode to
    /// an array leaves no keys, which falls back to offset paging.
    pub fn resume(mut self, snapshot: &str) -> Self {
        let snapshot = trim(snapshot.as_bytes());
        if snapshot.is_empty() {
            return self;
        }
        match unserialize(snapshot) {
            Ok(PhpValue::Array(entries)) => {
                self.keys = entries
                    .into_iter()
                    .map(|(key, value)| {
                        let name = match key {
                            ArrayKey::Int(i) => i.to_string(),
                            ArrayKey::Str(s) => String::from_utf8_lossy(&s).into_owned(),
                        };
                        (name, value)
                    })
                    .collect();
                self.first_select = false;
            }
            Ok(_) | Err(_) => {
                warn!(
                    "Ignoring unreadable primary key snapshot: {}",
                    String::from_utf8_lossy(snapshot)
                );
                self.keys.clear();
                self.first_select = false;
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn is_first_select(&self) -> bool {
        self.first_select
    }

    pub(crate) fn mark_selected(&mut self) {
        self.first_select = false;
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.keys.iter().any(|(name, _)| name == column)
    }

    pub fn value(&self, column: &str) -> Option<&PhpValue> {
        self.keys
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Records the key values of `row` as the last one counted.
    pub fn track(&mut self, row: &Row) {
        for (name, value) in &mut self.keys {
            *value = match row.get(name) {
                Some(Some(bytes)) => PhpValue::Str(bytes.clone()),
                _ => PhpValue::Null,
            };
        }
    }

    /// `a:N:{...}` snapshot for the resume token.
    pub fn serialize(&self) -> String {
        let entries = self
            .keys
            .iter()
            .map(|(name, value)| (ArrayKey::str(name), value.clone()))
            .collect();
        String::from_utf8_lossy(&serialize(&PhpValue::Array(entries))).into_owned()
    }

    /// Quoted SQL literal of a key value, as a string comparison.
    pub(crate) fn literal(value: &PhpValue) -> String {
        match value {
            PhpValue::Str(bytes) => quote_mimic(bytes),
            PhpValue::Int(i) => format!("'{i}'"),
            PhpValue::Float(f) => format!("'{f}'"),
            PhpValue::Bool(true) => "'1'".to_string(),
            _ => "''".to_string(),
        }
    }

    pub(crate) fn entries(&self) -> &[(String, PhpValue)] {
        &self.keys
    }
}
