//! Core types shared by every wp-db-sync crate.
//!
//! This crate holds the pieces that describe *what* a migration run is doing,
//! independent of how rows are read or where SQL ends up:
//!
//! - [`MigrationContext`]: the intent, stage, replacement pairs, site details
//!   and feature toggles of one run
//! - [`ReplacePair`]: one find/replace pair, applied in order
//! - [`Row`]: a fetched row as ordered `(column, bytes)` cells
//! - [`MigrationHooks`]: optional extension points consulted while streaming
//! - table naming helpers such as [`backquote`] and [`table_is`]

mod context;
mod hooks;
mod naming;
mod pairs;
mod row;

pub use context::{
    ImportInfo, Intent, MigrationContext, MigrationOptions, MultisiteConfig, SiteDetails,
    SiteUrls, Stage,
};
pub use hooks::{
    ColumnPredicate, CreateTableHook, DestinationHook, ListHook, MigrationHooks, RowFilterHook,
    SqlFragmentHook, TableNameHook,
};
pub use naming::{backquote, ms_compat_table_names, table_is};
pub use pairs::ReplacePair;
pub use row::{Cell, Row};
