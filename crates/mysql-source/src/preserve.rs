//! Options kept from the destination when its options tables are replaced.

use mysql_types::forward::escape_mimic;
use sync_core::{backquote, table_is, MigrationContext, MigrationHooks, Row};

use crate::accessor::DbAccessor;
use crate::cursor::STATE_OPTION_PREFIX;
use crate::error::MigrateError;

/// Options always carried over.
const PRESERVED_OPTIONS: [&str; 7] = [
    "wpmdb_settings",
    "wpmdb_error_log",
    "wpmdb_file_ignores",
    "wpmdb_schema_version",
    "upload_path",
    "upload_url_path",
    "blog_public",
];

fn quoted(row: &Row, column: &str) -> Vec<u8> {
    let value = row.get(column).and_then(|c| c.as_deref()).unwrap_or_default();
    let mut out = vec![b'\''];
    out.extend(escape_mimic(value));
    out.push(b'\'');
    out
}

fn in_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| String::from_utf8_lossy(&escape_mimic(name.as_bytes())).into_owned())
        .collect::<Vec<_>>()
        .join("','")
}

async fn state_option_names(
    db: &dyn DbAccessor,
    table: &str,
    column: &str,
) -> Result<Vec<String>, MigrateError> {
    let rows = db
        .query(&format!(
            "SELECT `{column}` FROM {} WHERE `{column}` LIKE '{STATE_OPTION_PREFIX}%'",
            backquote(table)
        ))
        .await?;
    Ok(rows.iter().filter_map(|row| row.text(column)).collect())
}

/// DELETE and INSERT statements that put the destination's preserved
/// options back into the staging copies of its options tables.
///
/// `temp_tables` are the staging tables of the migration. Empty when none of
/// them is an options (or, on a network, sitemeta) table.
pub async fn preserved_options_queries(
    db: &dyn DbAccessor,
    context: &MigrationContext,
    temp_tables: &[String],
) -> Result<Vec<u8>, MigrateError> {
    let table_prefix = &context.options.table_prefix;
    let staged_prefix = context.temp_name(table_prefix);
    let live_name = |temp_table: &str| format!("{table_prefix}{}", temp_table.replace(&staged_prefix, ""));

    let mut sitemeta_table = None;
    let mut options_tables = Vec::new();
    for temp_table in temp_tables {
        let table = live_name(temp_table);
        if context.multisite.enabled && table_is("sitemeta", &table, table_prefix) {
            sitemeta_table = Some(temp_table.clone());
        }
        if table_is("options", &table, table_prefix) {
            options_tables.push(temp_table.clone());
        }
    }
    if sitemeta_table.is_none() && options_tables.is_empty() {
        return Ok(Vec::new());
    }

    let mut options: Vec<String> = PRESERVED_OPTIONS.iter().map(|s| s.to_string()).collect();
    let mut sitemeta_options = options.clone();
    if context.options.keep_active_plugins {
        options.push("active_plugins".to_string());
        sitemeta_options.push("active_sitewide_plugins".to_string());
    }

    let mut sql = Vec::new();
    if context.multisite.enabled {
        if let Some(temp_table) = &sitemeta_table {
            let table = live_name(temp_table);
            sitemeta_options.extend(state_option_names(db, &table, "meta_key").await?);
            let rows = db
                .query(&format!(
                    "SELECT * FROM {} WHERE `meta_key` IN ('{}')",
                    backquote(&table),
                    in_list(&sitemeta_options)
                ))
                .await?;
            let temp = backquote(temp_table);
            for row in &rows {
                sql.extend(format!("DELETE FROM {temp} WHERE `meta_key` = ").into_bytes());
                sql.extend(quoted(row, "meta_key"));
                sql.extend_from_slice(b";\n");
                sql.extend(
                    format!("INSERT INTO {temp} ( `meta_id`, `site_id`, `meta_key`, `meta_value` ) VALUES ( NULL , ")
                        .into_bytes(),
                );
                sql.extend(quoted(row, "site_id"));
                sql.extend_from_slice(b", ");
                sql.extend(quoted(row, "meta_key"));
                sql.extend_from_slice(b", ");
                sql.extend(quoted(row, "meta_value"));
                sql.extend_from_slice(b" );\n");
            }
        }
    } else {
        options.extend(state_option_names(db, &context.prefixed("options"), "option_name").await?);
    }

    if options_tables.is_empty() {
        return Ok(sql);
    }
    let options = MigrationHooks::list(&context.hooks.preserved_options, options);
    for temp_table in &options_tables {
        let rows = db
            .query(&format!(
                "SELECT * FROM {} WHERE `option_name` IN ('{}')",
                backquote(&live_name(temp_table)),
                in_list(&options)
            ))
            .await?;
        let temp = backquote(temp_table);
        for row in &rows {
            sql.extend(format!("DELETE FROM {temp} WHERE `option_name` = ").into_bytes());
            sql.extend(quoted(row, "option_name"));
            sql.extend_from_slice(b";\n");
            sql.extend(
                format!("INSERT INTO {temp} ( `option_id`, `option_name`, `option_value`, `autoload` ) VALUES ( NULL , ")
                    .into_bytes(),
            );
            sql.extend(quoted(row, "option_name"));
            sql.extend_from_slice(b", ");
            sql.extend(quoted(row, "option_value"));
            sql.extend_from_slice(b", ");
            sql.extend(quoted(row, "autoload"));
            sql.extend_from_slice(b" );\n");
        }
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDb;
    use std::sync::Arc;
    use sync_core::{Intent, Stage};

    fn option(name: &str, value: &str) -> Row {
        Row::new()
            .with("option_id", Some("3"))
            .with("option_name", Some(name))
            .with("option_value", Some(value))
            .with("autoload", Some("yes"))
    }

    #[tokio::test]
    async fn test_options_rows_restored() {
        let db = FakeDb::new();
        db.respond(
            "LIKE 'wpmdb_state_%'",
            vec![Row::new().with("option_name", Some("wpmdb_state_abc"))],
        );
        db.respond(
            "SELECT * FROM `wp_options`",
            vec![option("blog_public", "0"), option("upload_path", "it's")],
        );
        let mut context = MigrationContext::new(Intent::Push, Stage::Migrate);
        context.hooks.preserved_options = Some(Arc::new(|mut names: Vec<String>| {
            names.push("my_option".to_string());
            names
        }));

        let sql = preserved_options_queries(
            &db,
            &context,
            &["_mig_wp_posts".to_string(), "_mig_wp_options".to_string()],
        )
        .await
        .unwrap();

        assert_eq!(
            String::from_utf8(sql).unwrap(),
            "DELETE FROM `_mig_wp_options` WHERE `option_name` = 'blog_public';\n\
             INSERT INTO `_mig_wp_options` ( `option_id`, `option_name`, `option_value`, `autoload` ) VALUES ( NULL , 'blog_public', '0', 'yes' );\n\
             DELETE FROM `_mig_wp_options` WHERE `option_name` = 'upload_path';\n\
             INSERT INTO `_mig_wp_options` ( `option_id`, `option_name`, `option_value`, `autoload` ) VALUES ( NULL , 'upload_path', 'it\\'s', 'yes' );\n"
        );

        let select = db
            .queries()
            .into_iter()
            .find(|q| q.starts_with("SELECT * FROM `wp_options`"))
            .unwrap();
        assert!(select.contains("'blog_public','wpmdb_state_abc','my_option')"));
    }

    #[tokio::test]
    async fn test_no_options_tables() {
        let db = FakeDb::new();
        let context = MigrationContext::new(Intent::Push, Stage::Migrate);
        let sql = preserved_options_queries(&db, &context, &["_mig_wp_posts".to_string()])
            .await
            .unwrap();
        assert!(sql.is_empty());
        assert!(db.queries().is_empty());
    }

    #[tokio::test]
    async fn test_sitemeta_on_network() {
        let db = FakeDb::new();
        db.respond(
            "SELECT * FROM `wp_sitemeta`",
            vec![Row::new()
                .with("meta_id", Some("9"))
                .with("site_id", Some("1"))
                .with("meta_key", Some("active_sitewide_plugins"))
                .with("meta_value", Some("a:0:{}"))],
        );
        let mut context = MigrationContext::new(Intent::Push, Stage::Migrate);
        context.multisite.enabled = true;
        context.options.keep_active_plugins = true;

        let sql = preserved_options_queries(&db, &context, &["_mig_wp_sitemeta".to_string()])
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(sql).unwrap(),
            "DELETE FROM `_mig_wp_sitemeta` WHERE `meta_key` = 'active_sitewide_plugins';\n\
             INSERT INTO `_mig_wp_sitemeta` ( `meta_id`, `site_id`, `meta_key`, `meta_value` ) VALUES ( NULL , '1', 'active_sitewide_plugins', 'a:0:{}' );\n"
        );
        assert!(db
            .queries()
            .iter()
            .any(|q| q.contains("'blog_public','active_sitewide_plugins')")));
    }
}
