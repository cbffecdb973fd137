//! Table listing and staging table cleanup.

use sync_core::{backquote, MigrationContext};
use tracing::info;

use crate::accessor::DbAccessor;
use crate::cache::MigrationCache;
use crate::error::MigrateError;
use crate::execute::process_chunk;

/// Base tables of the database, optionally only those starting with
/// `prefix`. Views and the legacy alter table are never listed.
pub async fn get_tables(
    db: &dyn DbAccessor,
    context: &MigrationContext,
    prefix: Option<&str>,
) -> Result<Vec<String>, MigrateError> {
    let legacy_alter_table = MigrationCache::legacy_alter_table_name(context);
    Ok(db
        .list_tables()
        .await?
        .into_iter()
        .filter(|entry| !entry.is_view && entry.name != legacy_alter_table)
        .filter(|entry| prefix.map_or(true, |prefix| entry.name.starts_with(prefix)))
        .map(|entry| entry.name)
        .collect())
}

/// Drops every table carrying the temporary prefix. Returns the dropped
/// names.
pub async fn delete_temporary_tables(
    db: &dyn DbAccessor,
    context: &MigrationContext,
) -> Result<Vec<String>, MigrateError> {
    let tables = get_tables(db, context, Some(&context.options.temp_prefix)).await?;
    if tables.is_empty() {
        return Ok(tables);
    }
    let sql: String = tables
        .iter()
        .map(|table| format!("DROP TABLE {};\n", backquote(table)))
        .collect();
    process_chunk(db, &context.options, sql.as_bytes()).await?;
    info!("Dropped {} temporary tables", tables.len());
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDb;
    use sync_core::{Intent, Stage};

    fn db() -> FakeDb {
        let db = FakeDb::new();
        for table in [
            "wp_options",
            "_mig_wp_options",
            "wp_wpmdb_alter_statements",
            "_mig_wpmdb_alter_statements",
            "other_log",
        ] {
            db.add_table(table, Vec::new(), "");
        }
        db.add_view("wp_report");
        db
    }

    #[tokio::test]
    async fn test_get_tables() {
        let db = db();
        let context = MigrationContext::new(Intent::Push, Stage::Migrate);

        assert_eq!(
            get_tables(&db, &context, None).await.unwrap(),
            vec![
                "wp_options",
                "_mig_wp_options",
                "_mig_wpmdb_alter_statements",
                "other_log"
            ]
        );
        assert_eq!(
            get_tables(&db, &context, Some("wp_")).await.unwrap(),
            vec!["wp_options"]
        );
    }

    #[tokio::test]
    async fn test_delete_temporary_tables() {
        let db = db();
        let context = MigrationContext::new(Intent::Push, Stage::Migrate);

        let dropped = delete_temporary_tables(&db, &context).await.unwrap();
        assert_eq!(dropped, vec!["_mig_wp_options", "_mig_wpmdb_alter_statements"]);
        assert_eq!(
            db.executed(),
            vec![
                "SET sql_mode='NO_AUTO_VALUE_ON_ZERO';".to_string(),
                "DROP TABLE `_mig_wp_options`".to_string(),
                "DROP TABLE `_mig_wpmdb_alter_statements`".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_to_delete() {
        let db = FakeDb::new();
        let context = MigrationContext::new(Intent::Push, Stage::Migrate);
        assert!(delete_temporary_tables(&db, &context).await.unwrap().is_empty());
        assert!(db.executed().is_empty());
    }
}
