//! Extension points consulted while a table is streamed.
//!
//! Every hook is optional. An unset hook leaves the default behaviour in
//! place, so `MigrationHooks::default()` is a plain migration.

use std::fmt;
use std::sync::Arc;

use crate::context::{Intent, Stage};
use crate::row::Row;

/// Maps a source table name to the name written on the destination.
pub type TableNameHook = Arc<dyn Fn(&str, Intent, Stage) -> String + Send + Sync>;

/// Rewrites one SQL fragment (JOIN, WHERE, ORDER BY, LIMIT or the whole
/// SELECT) for the given table.
pub type SqlFragmentHook = Arc<dyn Fn(String, &str) -> String + Send + Sync>;

/// Returns `false` to drop a row before it is encoded.
pub type RowFilterHook = Arc<dyn Fn(&Row, &str, Intent, Stage) -> bool + Send + Sync>;

/// Adjusts a list of names (tables, columns or option keys).
pub type ListHook = Arc<dyn Fn(Vec<String>) -> Vec<String> + Send + Sync>;

/// Decides whether a column, given its name and declared type, gets a shadow
/// projection.
pub type ColumnPredicate = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Rewrites the CREATE TABLE statement for `(statement, target_table)`.
pub type CreateTableHook = Arc<dyn Fn(String, &str) -> String + Send + Sync>;

/// Receives the destination URL; returns `false` to turn the protocol
/// rewrite off.
pub type DestinationHook = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct MigrationHooks {
    pub target_table_name: Option<TableNameHook>,
    pub rows_join: Option<SqlFragmentHook>,
    pub rows_where: Option<SqlFragmentHook>,
    pub rows_order_by: Option<SqlFragmentHook>,
    pub rows_limit: Option<SqlFragmentHook>,
    pub rows_sql: Option<SqlFragmentHook>,
    pub table_row: Option<RowFilterHook>,
    pub json_replace_tables: Option<ListHook>,
    pub json_replace_columns: Option<ListHook>,
    pub preserved_options: Option<ListHook>,
    pub column_as_binary: Option<ColumnPredicate>,
    pub column_as_bit: Option<ColumnPredicate>,
    pub create_table_query: Option<CreateTableHook>,
    /// Extra statements stored alongside the deferred constraints of a table.
    pub alter_data_queries: Option<Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>>,
    pub subdomain_replaces: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
    pub replace_destination_protocol: Option<DestinationHook>,
}

impl MigrationHooks {
    pub fn target_table(&self, table: &str, intent: Intent, stage: Stage) -> String {
        match &self.target_table_name {
            Some(hook) => hook(table, intent, stage),
            None => table.to_string(),
        }
    }

    pub fn accepts_row(&self, row: &Row, table: &str, intent: Intent, stage: Stage) -> bool {
        self.table_row
            .as_ref()
            .map_or(true, |hook| hook(row, table, intent, stage))
    }

    pub fn fragment(hook: &Option<SqlFragmentHook>, fragment: String, table: &str) -> String {
        match hook {
            Some(hook) => hook(fragment, table),
            None => fragment,
        }
    }

    pub fn list(hook: &Option<ListHook>, names: Vec<String>) -> Vec<String> {
        match hook {
            Some(hook) => hook(names),
            None => names,
        }
    }
}

impl fmt::Debug for MigrationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = [
            ("target_table_name", self.target_table_name.is_some()),
            ("rows_join", self.rows_join.is_some()),
            ("rows_where", self.rows_where.is_some()),
            ("rows_order_by", self.rows_order_by.is_some()),
            ("rows_limit", self.rows_limit.is_some()),
            ("rows_sql", self.rows_sql.is_some()),
            ("table_row", self.table_row.is_some()),
            ("json_replace_tables", self.json_replace_tables.is_some()),
            ("json_replace_columns", self.json_replace_columns.is_some()),
            ("preserved_options", self.preserved_options.is_some()),
            ("column_as_binary", self.column_as_binary.is_some()),
            ("column_as_bit", self.column_as_bit.is_some()),
            ("create_table_query", self.create_table_query.is_some()),
            ("alter_data_queries", self.alter_data_queries.is_some()),
            ("subdomain_replaces", self.subdomain_replaces.is_some()),
            (
                "replace_destination_protocol",
                self.replace_destination_protocol.is_some(),
            ),
        ]
        .into_iter()
        .filter_map(|(name, is_set)| is_set.then_some(name))
        .collect();
        f.debug_struct("MigrationHooks").field("set", &set).finish()
    }
}
