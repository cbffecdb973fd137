//! MySQL table structure inspection.
//!
//! `DESCRIBE` output is reduced to the handful of facts the row encoder and
//! the page cursor need: which columns are integers (and their defaults),
//! which need hex or bit shadow projections, and whether the table has an
//! all-integer primary key usable for keyset pagination.

use std::collections::{HashMap, HashSet};
use sync_core::{backquote, MigrationHooks, Row};
use thiserror::Error;

/// Integer column type prefixes. `int` also covers `integer`.
const INTEGER_TYPES: [&str; 5] = ["tinyint", "smallint", "mediumint", "int", "bigint"];

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to retrieve table structure for table '{table}', please ensure your database is online.")]
    StructureUnavailable { table: String },

    #[error("Failed to generate the create table query for table '{table}', please ensure your database is online.")]
    CreateTableUnavailable { table: String },

    #[error("Error creating temporary table. Table \"{table}\" does not exist.")]
    TableMissing { table: String },
}

/// One row of `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub field: String,
    pub column_type: String,
    pub nullable: bool,
    /// `PRI`, `UNI`, `MUL` or empty.
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

impl ColumnDescriptor {
    pub fn new(field: &str, column_type: &str, key: &str, default: Option<&str>) -> Self {
        Self {
            field: field.to_string(),
            column_type: column_type.to_string(),
            nullable: true,
            key: key.to_string(),
            default: default.map(str::to_string),
            extra: String::new(),
        }
    }

    /// Reads a `DESCRIBE` result row (`Field`, `Type`, `Null`, `Key`,
    /// `Default`, `Extra`).
    pub fn from_describe_row(row: &Row) -> Option<Self> {
        Some(Self {
            field: row.text("Field")?,
            column_type: row.text("Type")?,
            nullable: row.text("Null").is_some_and(|n| n.eq_ignore_ascii_case("YES")),
            key: row.text("Key").unwrap_or_default(),
            default: row.text("Default"),
            extra: row.text("Extra").unwrap_or_default(),
        })
    }

    pub fn is_primary(&self) -> bool {
        self.key == "PRI"
    }

    pub fn is_integer(&self) -> bool {
        let ty = self.column_type.to_ascii_lowercase();
        INTEGER_TYPES.iter().any(|prefix| ty.starts_with(prefix))
    }

    pub fn is_binary(&self) -> bool {
        self.column_type.to_ascii_lowercase().starts_with("binary")
    }

    pub fn is_bit(&self) -> bool {
        self.column_type.to_ascii_lowercase().starts_with("bit")
    }
}

/// Column classification of one table, derived once and read-only after.
///
/// Lookups by column name are case-insensitive, matching MySQL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStructure {
    /// Lower-cased integer column name to the literal used for empty values.
    integer_defaults: HashMap<String, String>,
    binary: HashSet<String>,
    bit: HashSet<String>,
    /// Binary columns in declaration order, as declared.
    pub binary_columns: Vec<String>,
    /// Bit columns in declaration order, as declared.
    pub bit_columns: Vec<String>,
    /// Backquoted column names in declaration order.
    pub field_set: Vec<String>,
    /// Integer primary key columns in declaration order. Empty when the table
    /// has no primary key or any part of it is not an integer.
    pub primary_keys: Vec<String>,
}

impl TableStructure {
    pub fn inspect(columns: &[ColumnDescriptor], hooks: &MigrationHooks) -> Self {
        let mut structure = Self::default();
        let mut use_primary_keys = true;
        let as_binary = |c: &ColumnDescriptor| {
            hooks
                .column_as_binary
                .as_ref()
                .is_some_and(|hook| hook(&c.field, &c.column_type))
        };
        let as_bit = |c: &ColumnDescriptor| {
            hooks
                .column_as_bit
                .as_ref()
                .is_some_and(|hook| hook(&c.field, &c.column_type))
        };

        for column in columns {
            let lower = column.field.to_ascii_lowercase();
            if column.is_integer() {
                let default = column.default.clone().unwrap_or_else(|| "NULL".to_string());
                structure.integer_defaults.insert(lower, default);
            } else if column.is_binary() || as_binary(column) {
                structure.binary.insert(lower);
                structure.binary_columns.push(column.field.clone());
            } else if column.is_bit() || as_bit(column) {
                structure.bit.insert(lower);
                structure.bit_columns.push(column.field.clone());
            }
            structure.field_set.push(backquote(&column.field));

            if column.is_primary() && use_primary_keys {
                if !column.is_integer() {
                    use_primary_keys = false;
                    structure.primary_keys.clear();
                    continue;
                }
                structure.primary_keys.push(column.field.clone());
            }
        }
        structure
    }

    pub fn is_integer(&self, column: &str) -> bool {
        self.integer_defaults
            .contains_key(&column.to_ascii_lowercase())
    }

    /// Literal written for an empty integer value: the column default, or
    /// `NULL` when there is none.
    pub fn integer_default(&self, column: &str) -> Option<&str> {
        self.integer_defaults
            .get(&column.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_binary(&self, column: &str) -> bool {
        self.binary.contains(&column.to_ascii_lowercase())
    }

    pub fn is_bit(&self, column: &str) -> bool {
        self.bit.contains(&column.to_ascii_lowercase())
    }

    /// Whether `column` is a `__hex`/`__bit` projection of a binary or bit
    /// column rather than a real column.
    pub fn is_shadow(&self, column: &str) -> bool {
        let lower = column.to_ascii_lowercase();
        if let Some(base) = lower.strip_suffix("__hex") {
            return self.binary.contains(base);
        }
        if let Some(base) = lower.strip_suffix("__bit") {
            return self.bit.contains(base);
        }
        false
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|pk| pk == column)
    }

    pub fn has_primary_keys(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    /// `col1, col2, ...` for the INSERT column list.
    pub fn column_list(&self) -> String {
        self.field_set.join(", ")
    }
}

/// Name of the hex shadow projection of a binary column.
pub fn hex_shadow(column: &str) -> String {
    format!("{}__hex", column.to_ascii_lowercase())
}

/// Name of the bit shadow projection of a bit column.
pub fn bit_shadow(column: &str) -> String {
    format!("{}__bit", column.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("ID", "bigint(20) unsigned", "PRI", None),
            ColumnDescriptor::new("menu_order", "int(11)", "", Some("0")),
            ColumnDescriptor::new("Token", "binary(16)", "", None),
            ColumnDescriptor::new("flags", "bit(8)", "", None),
            ColumnDescriptor::new("post_title", "text", "", None),
        ]
    }

    #[test]
    fn test_classification() {
        let s = TableStructure::inspect(&columns(), &MigrationHooks::default());
        assert!(s.is_integer("id"));
        assert_eq!(s.integer_default("ID"), Some("NULL"));
        assert_eq!(s.integer_default("menu_order"), Some("0"));
        assert!(s.is_binary("token"));
        assert_eq!(s.binary_columns, vec!["Token".to_string()]);
        assert!(s.is_bit("FLAGS"));
        assert!(!s.is_integer("post_title"));
        assert_eq!(s.primary_keys, vec!["ID".to_string()]);
        assert_eq!(
            s.column_list(),
            "`ID`, `menu_order`, `Token`, `flags`, `post_title`"
        );
        assert!(s.is_shadow("token__hex"));
        assert!(s.is_shadow("flags__bit"));
        assert!(!s.is_shadow("post_title__hex"));
        assert!(!s.is_shadow("flags"));
    }

    #[test]
    fn test_compound_integer_key() {
        let cols = vec![
            ColumnDescriptor::new("term_id", "bigint(20)", "PRI", None),
            ColumnDescriptor::new("object_id", "bigint(20)", "PRI", None),
        ];
        let s = TableStructure::inspect(&cols, &MigrationHooks::default());
        assert_eq!(s.primary_keys, vec!["term_id".to_string(), "object_id".to_string()]);
    }

    #[test]
    fn test_non_integer_key_disables_keyset() {
        let cols = vec![
            ColumnDescriptor::new("blog_id", "bigint(20)", "PRI", None),
            ColumnDescriptor::new("meta_key", "varchar(255)", "PRI", None),
            ColumnDescriptor::new("other_id", "int(11)", "PRI", None),
        ];
        let s = TableStructure::inspect(&cols, &MigrationHooks::default());
        assert!(!s.has_primary_keys());
        assert_eq!(s.field_set.len(), 3);
    }

    #[test]
    fn test_hooks_force_binary() {
        let hooks = MigrationHooks {
            column_as_binary: Some(Arc::new(|field: &str, _: &str| field == "payload")),
            ..Default::default()
        };
        let cols = vec![ColumnDescriptor::new("payload", "longblob", "", None)];
        let s = TableStructure::inspect(&cols, &hooks);
        assert!(s.is_binary("payload"));
    }

    #[test]
    fn test_from_describe_row() {
        let row = Row::new()
            .with("Field", Some("option_id"))
            .with("Type", Some("bigint(20) unsigned"))
            .with("Null", Some("NO"))
            .with("Key", Some("PRI"))
            .with("Default", None)
            .with("Extra", Some("auto_increment"));
        let column = ColumnDescriptor::from_describe_row(&row).unwrap();
        assert_eq!(column.field, "option_id");
        assert!(!column.nullable);
        assert!(column.is_primary());
        assert_eq!(column.default, None);
        assert_eq!(column.extra, "auto_increment");

        assert!(ColumnDescriptor::from_describe_row(&Row::new()).is_none());
    }

    #[test]
    fn test_shadow_names() {
        assert_eq!(hex_shadow("Token"), "token__hex");
        assert_eq!(bit_shadow("flags"), "flags__bit");
    }
}
