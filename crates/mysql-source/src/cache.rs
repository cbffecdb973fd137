//! Values computed once per migration.

use mysql_types::ddl::create_alter_table_query;
use sync_core::MigrationContext;

use crate::accessor::DbAccessor;
use crate::dump::fetch_post_types;
use crate::error::DbError;

/// Base name of the table collecting deferred ALTER statements.
pub const ALTER_TABLE_BASE: &str = "wpmdb_alter_statements";

/// Per-migration cache. Create one at migration start, or [`clear`] the
/// existing one, so nothing leaks from a previous run.
///
/// [`clear`]: MigrationCache::clear
#[derive(Debug, Default)]
pub struct MigrationCache {
    create_alter_table_query: Option<String>,
    post_types: Option<Vec<String>>,
}

impl MigrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// `<temp_prefix>wpmdb_alter_statements`
    pub fn alter_table_name(context: &MigrationContext) -> String {
        context.temp_name(ALTER_TABLE_BASE)
    }

    /// The name older releases used, `<table_prefix>wpmdb_alter_statements`.
    pub fn legacy_alter_table_name(context: &MigrationContext) -> String {
        context.prefixed(ALTER_TABLE_BASE)
    }

    /// Drops both alter tables and recreates the current one.
    pub fn create_alter_table_query(&mut self, context: &MigrationContext) -> String {
        self.create_alter_table_query
            .get_or_insert_with(|| {
                create_alter_table_query(
                    &Self::legacy_alter_table_name(context),
                    &Self::alter_table_name(context),
                )
            })
            .clone()
    }

    pub async fn post_types(
        &mut self,
        db: &dyn DbAccessor,
        context: &MigrationContext,
    ) -> Result<Vec<String>, DbError> {
        if let Some(post_types) = &self.post_types {
            return Ok(post_types.clone());
        }
        let post_types = fetch_post_types(db, context).await?;
        self.post_types = Some(post_types.clone());
        Ok(post_types)
    }
}
