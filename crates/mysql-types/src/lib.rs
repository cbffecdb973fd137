//! MySQL handling for wp-db-sync.
//!
//! # Structure
//!
//! - `schema`: `DESCRIBE` output and the per-table [`TableStructure`] derived
//!   from it (integer, binary and bit columns, defaults, primary key)
//! - `forward`: encode cell bytes as SQL literals for INSERT and UPDATE
//! - `reverse`: convert `mysql_async` values and rows into [`sync_core::Row`]
//! - `ddl`: normalize `SHOW CREATE TABLE` output and split out constraints
//!
//! # Example
//!
//! ```rust
//! use mysql_types::{forward, ColumnDescriptor, TableStructure};
//!
//! let columns = vec![
//!     ColumnDescriptor::new("ID", "bigint(20) unsigned", "PRI", None),
//!     ColumnDescriptor::new("post_title", "text", "", None),
//! ];
//! let structure = TableStructure::inspect(&columns, &Default::default());
//! assert_eq!(structure.primary_keys, vec!["ID".to_string()]);
//! assert_eq!(structure.column_list(), "`ID`, `post_title`");
//!
//! assert_eq!(forward::quote_insert(b"it's\n"), b"'it\\'s\\n'".to_vec());
//! ```

pub mod ddl;
pub mod forward;
pub mod reverse;
pub mod schema;

pub use reverse::{row_to_cells, value_to_cell};
pub use schema::{ColumnDescriptor, SchemaError, TableStructure};
