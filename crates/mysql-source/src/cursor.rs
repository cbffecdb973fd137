//! SELECT generation for paging through a table.
//!
//! Tables with an integer primary key are read with keyset paging:
//! `ORDER BY` the key and continue after the last tuple seen, so no row is
//! read twice even when the table is read over many steps. Other tables use
//! `LIMIT offset, count`.

use mysql_types::forward::escape_mimic;
use mysql_types::schema::{bit_shadow, hex_shadow};
use mysql_types::TableStructure;
use sync_core::{backquote, ms_compat_table_names, table_is, Intent, MigrationContext, MigrationHooks, Stage};

use crate::keys::PrimaryKeyState;

/// Option rows the tool keeps for itself and never migrates outside a backup.
const RESERVED_OPTIONS: [&str; 4] = [
    "wpmdb_settings",
    "wpmdb_error_log",
    "wpmdb_file_ignores",
    "wpmdb_schema_version",
];

/// Prefix of the per-migration state options.
pub const STATE_OPTION_PREFIX: &str = "wpmdb_state_";

pub struct PageCursor<'a> {
    context: &'a MigrationContext,
    table: &'a str,
}

impl<'a> PageCursor<'a> {
    pub fn new(context: &'a MigrationContext, table: &'a str) -> Self {
        Self { context, table }
    }

    /// Builds the SELECT for the page starting at `row_start`.
    ///
    /// With keyset paging `row_start` is not used in the query; the position
    /// comes from `keys`, and the first call marks the table as started.
    pub fn next_page(
        &self,
        row_start: u64,
        structure: &TableStructure,
        keys: &mut PrimaryKeyState,
    ) -> String {
        let hooks = &self.context.hooks;
        let (joins, mut where_clause) = self.filters();

        let mut order_by = String::new();
        let mut limit = format!(
            "LIMIT {row_start}, {}",
            self.context.options.rows_per_segment
        );

        if !keys.is_empty() {
            let columns: Vec<String> = keys.columns().map(backquote).collect();
            order_by = format!("ORDER BY {}", columns.join(","));
            limit = format!("LIMIT {}", self.context.options.rows_per_segment);

            if !keys.is_first_select() {
                where_clause.push_str(" AND ");
                where_clause.push_str(&after_tuple(keys));
            }
            keys.mark_selected();
        }

        let mut select = format!("{}.*", backquote(self.table));
        for column in &structure.binary_columns {
            select.push_str(&format!(
                ", HEX({}) as {}",
                backquote(column),
                backquote(&hex_shadow(column))
            ));
        }
        for column in &structure.bit_columns {
            select.push_str(&format!(
                ", {}+0 as {}",
                backquote(column),
                backquote(&bit_shadow(column))
            ));
        }

        let join = MigrationHooks::fragment(&hooks.rows_join, joins.join(" "), self.table);
        let where_clause = MigrationHooks::fragment(&hooks.rows_where, where_clause, self.table);
        let order_by = MigrationHooks::fragment(&hooks.rows_order_by, order_by, self.table);
        let limit = MigrationHooks::fragment(&hooks.rows_limit, limit, self.table);

        let sql = format!(
            "SELECT {select} FROM {} {join} {where_clause} {order_by} {limit}",
            backquote(self.table)
        );
        MigrationHooks::fragment(&hooks.rows_sql, sql, self.table)
    }

    /// Prefix the core tables of this table's site are named with.
    fn prefix(&self) -> String {
        let options = &self.context.options;
        match self.context.intent {
            Intent::Import => format!("{}{}", options.temp_prefix, options.table_prefix),
            _ => options.table_prefix.clone(),
        }
    }

    fn is(&self, desired: &str) -> bool {
        table_is(desired, self.table, &self.prefix())
    }

    fn is_sitemeta(&self) -> bool {
        self.context.multisite.enabled && self.table == self.context.prefixed("sitemeta")
    }

    /// JOINs and the WHERE clause that leave out rows not to be migrated.
    pub fn filters(&self) -> (Vec<String>, String) {
        let context = self.context;
        let options = &context.options;
        let mut joins: Vec<String> = Vec::new();
        let mut where_clause = String::from("WHERE 1=1");
        let filtering = context.intent != Intent::Import && context.stage != Stage::Backup;

        let names = |tables: &[&str]| {
            ms_compat_table_names(tables, self.table, &self.prefix(), context.multisite.enabled)
        };

        if filtering && options.exclude_spam {
            if self.is("comments") {
                where_clause.push_str(" AND comment_approved != 'spam'");
            } else if self.is("commentmeta") {
                let t = names(&["commentmeta", "comments"]);
                let comments = backquote(&t["comments"]);
                joins.push(format!(
                    "INNER JOIN {comments} ON {comments}.comment_ID = {}.comment_id",
                    backquote(&t["commentmeta"])
                ));
                where_clause.push_str(&format!(" AND {comments}.comment_approved != 'spam'"));
            }
        }

        if filtering && !options.exclude_post_types.is_empty() {
            let post_types = options
                .exclude_post_types
                .iter()
                .map(|t| format!("'{}'", String::from_utf8_lossy(&escape_mimic(t.as_bytes()))))
                .collect::<Vec<_>>()
                .join(", ");
            let not_in = |posts: &str| format!(" AND {posts}.post_type NOT IN ( {post_types} )");

            if self.is("posts") {
                where_clause.push_str(&format!(" AND `post_type` NOT IN ( {post_types} )"));
            } else if self.is("postmeta") {
                let t = names(&["postmeta", "posts"]);
                let posts = backquote(&t["posts"]);
                joins.push(format!(
                    "INNER JOIN {posts} ON {posts}.ID = {}.post_id",
                    backquote(&t["postmeta"])
                ));
                where_clause.push_str(&not_in(&posts));
            } else if self.is("comments") {
                let t = names(&["comments", "posts"]);
                let posts = backquote(&t["posts"]);
                joins.push(format!(
                    "INNER JOIN {posts} ON {posts}.ID = {}.comment_post_ID",
                    backquote(&t["comments"])
                ));
                where_clause.push_str(&not_in(&posts));
            } else if self.is("commentmeta") {
                let t = names(&["commentmeta", "posts", "comments"]);
                let comments = backquote(&t["comments"]);
                let posts = backquote(&t["posts"]);
                joins.push(format!(
                    "INNER JOIN {comments} ON {comments}.comment_ID = {}.comment_id",
                    backquote(&t["commentmeta"])
                ));
                joins.push(format!(
                    "INNER JOIN {posts} ON {posts}.ID = {comments}.comment_post_ID"
                ));
                where_clause.push_str(&not_in(&posts));
            }
        }

        let options_like = self.is("options") || self.is_sitemeta();
        let column = if self.is_sitemeta() {
            "meta_key"
        } else {
            "option_name"
        };

        if filtering && options.exclude_transients && options_like {
            where_clause.push_str(&format!(
                " AND `{column}` NOT LIKE '\\_transient\\_%' AND `{column}` NOT LIKE '\\_site\\_transient\\_%'"
            ));
        }

        if context.stage != Stage::Backup && options_like {
            for option in RESERVED_OPTIONS {
                where_clause.push_str(&format!(" AND `{column}` != '{option}'"));
            }
            where_clause.push_str(&format!(
                " AND `{column}` NOT LIKE '{STATE_OPTION_PREFIX}%'"
            ));
        }

        joins.dedup();
        (joins, where_clause)
    }
}

/// `( ( a = x AND b > y ) OR ( a > x ) )`: rows strictly after the tracked
/// tuple in key order.
fn after_tuple(keys: &PrimaryKeyState) -> String {
    let entries = keys.entries();
    let mut clauses = Vec::with_capacity(entries.len());
    for remaining in (1..=entries.len()).rev() {
        let subclauses: Vec<String> = entries[..remaining]
            .iter()
            .enumerate()
            .map(|(i, (column, value))| {
                let operator = if i == remaining - 1 { ">" } else { "=" };
                format!(
                    "{} {operator} {}",
                    backquote(column),
                    PrimaryKeyState::literal(value)
                )
            })
            .collect();
        clauses.push(format!("( {} )", subclauses.join(" AND ")));
    }
    format!("( {} )", clauses.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_types::ColumnDescriptor;
    use std::sync::Arc;
    use sync_core::Row;

    fn context(intent: Intent, stage: Stage) -> MigrationContext {
        MigrationContext::new(intent, stage)
    }

    fn posts_structure() -> TableStructure {
        TableStructure::inspect(
            &[
                ColumnDescriptor::new("ID", "bigint(20) unsigned", "PRI", None),
                ColumnDescriptor::new("post_title", "text", "", None),
            ],
            &MigrationHooks::default(),
        )
    }

    #[test]
    fn test_keyset_first_page() {
        let ctx = context(Intent::Push, Stage::Migrate);
        let structure = posts_structure();
        let mut keys = PrimaryKeyState::from_structure(&structure);
        let sql = PageCursor::new(&ctx, "wp_posts").next_page(0, &structure, &mut keys);
        assert_eq!(
            sql,
            "SELECT `wp_posts`.* FROM `wp_posts`  WHERE 1=1 ORDER BY `ID` LIMIT 100"
        );
        assert!(!keys.is_first_select());
    }

    #[test]
    fn test_keyset_continues_after_last_row() {
        let ctx = context(Intent::Push, Stage::Migrate);
        let structure = posts_structure();
        let mut keys = PrimaryKeyState::from_structure(&structure);
        let cursor = PageCursor::new(&ctx, "wp_posts");
        cursor.next_page(0, &structure, &mut keys);
        keys.track(&Row::new().with("ID", Some("42")));

        let sql = cursor.next_page(100, &structure, &mut keys);
        assert_eq!(
            sql,
            "SELECT `wp_posts`.* FROM `wp_posts`  WHERE 1=1 AND ( ( `ID` > '42' ) ) ORDER BY `ID` LIMIT 100"
        );
    }

    #[test]
    fn test_compound_key_clauses() {
        let ctx = context(Intent::Push, Stage::Migrate);
        let structure = TableStructure::inspect(
            &[
                ColumnDescriptor::new("a", "int(11)", "PRI", None),
                ColumnDescriptor::new("b", "int(11)", "PRI", None),
                ColumnDescriptor::new("c", "int(11)", "PRI", None),
            ],
            &MigrationHooks::default(),
        );
        let mut keys = PrimaryKeyState::from_structure(&structure)
            .resume(r#"a:3:{s:1:"a";s:1:"1";s:1:"b";s:1:"2";s:1:"c";s:1:"3";}"#);
        let sql = PageCursor::new(&ctx, "wp_rel").next_page(0, &structure, &mut keys);
        assert!(sql.contains(
            "WHERE 1=1 AND ( ( `a` = '1' AND `b` = '2' AND `c` > '3' ) OR ( `a` = '1' AND `b` > '2' ) OR ( `a` > '1' ) )"
        ));
        assert!(sql.ends_with("ORDER BY `a`,`b`,`c` LIMIT 100"));
    }

    #[test]
    fn test_offset_paging_without_integer_key() {
        let ctx = context(Intent::Push, Stage::Migrate);
        let structure = TableStructure::inspect(
            &[
                ColumnDescriptor::new("name", "varchar(20)", "PRI", None),
                ColumnDescriptor::new("token", "binary(16)", "", None),
                ColumnDescriptor::new("flags", "bit(4)", "", None),
            ],
            &MigrationHooks::default(),
        );
        let mut keys = PrimaryKeyState::from_structure(&structure);
        let sql = PageCursor::new(&ctx, "wp_tokens").next_page(300, &structure, &mut keys);
        assert_eq!(
            sql,
            "SELECT `wp_tokens`.*, HEX(`token`) as `token__hex`, `flags`+0 as `flags__bit` FROM `wp_tokens`  WHERE 1=1  LIMIT 300, 100"
        );
    }

    #[test]
    fn test_spam_and_post_type_filters() {
        let mut ctx = context(Intent::Push, Stage::Migrate);
        ctx.options.exclude_spam = true;
        ctx.options.exclude_post_types = vec!["revision".into(), "oembed_cache".into()];

        let (joins, where_clause) = PageCursor::new(&ctx, "wp_comments").filters();
        assert_eq!(
            joins,
            vec!["INNER JOIN `wp_posts` ON `wp_posts`.ID = `wp_comments`.comment_post_ID"]
        );
        assert_eq!(
            where_clause,
            "WHERE 1=1 AND comment_approved != 'spam' AND `wp_posts`.post_type NOT IN ( 'revision', 'oembed_cache' )"
        );

        let (joins, where_clause) = PageCursor::new(&ctx, "wp_commentmeta").filters();
        assert_eq!(
            joins,
            vec![
                "INNER JOIN `wp_comments` ON `wp_comments`.comment_ID = `wp_commentmeta`.comment_id",
                "INNER JOIN `wp_posts` ON `wp_posts`.ID = `wp_comments`.comment_post_ID",
            ]
        );
        assert!(where_clause.contains("`wp_comments`.comment_approved != 'spam'"));
        assert!(where_clause.ends_with("`wp_posts`.post_type NOT IN ( 'revision', 'oembed_cache' )"));

        let (_, where_clause) = PageCursor::new(&ctx, "wp_posts").filters();
        assert_eq!(
            where_clause,
            "WHERE 1=1 AND `post_type` NOT IN ( 'revision', 'oembed_cache' )"
        );
    }

    #[test]
    fn test_multisite_join_targets_site_tables() {
        let mut ctx = context(Intent::Push, Stage::Migrate);
        ctx.multisite.enabled = true;
        ctx.options.exclude_post_types = vec!["revision".into()];
        let (joins, _) = PageCursor::new(&ctx, "wp_3_postmeta").filters();
        assert_eq!(
            joins,
            vec!["INNER JOIN `wp_3_posts` ON `wp_3_posts`.ID = `wp_3_postmeta`.post_id"]
        );
    }

    #[test]
    fn test_options_filters() {
        let mut ctx = context(Intent::Push, Stage::Migrate);
        ctx.options.exclude_transients = true;
        let (_, where_clause) = PageCursor::new(&ctx, "wp_options").filters();
        assert_eq!(
            where_clause,
            "WHERE 1=1 AND `option_name` NOT LIKE '\\_transient\\_%' AND `option_name` NOT LIKE '\\_site\\_transient\\_%' \
             AND `option_name` != 'wpmdb_settings' AND `option_name` != 'wpmdb_error_log' \
             AND `option_name` != 'wpmdb_file_ignores' AND `option_name` != 'wpmdb_schema_version' \
             AND `option_name` NOT LIKE 'wpmdb_state_%'"
        );

        ctx.multisite.enabled = true;
        let (_, where_clause) = PageCursor::new(&ctx, "wp_sitemeta").filters();
        assert!(where_clause.contains("`meta_key` NOT LIKE '\\_transient\\_%'"));
        assert!(where_clause.contains("`meta_key` != 'wpmdb_settings'"));
    }

    #[test]
    fn test_backup_and_import_skip_filters() {
        let mut ctx = context(Intent::Push, Stage::Backup);
        ctx.options.exclude_spam = true;
        ctx.options.exclude_transients = true;
        assert_eq!(PageCursor::new(&ctx, "wp_options").filters().1, "WHERE 1=1");
        assert_eq!(PageCursor::new(&ctx, "wp_comments").filters().1, "WHERE 1=1");

        let mut ctx = context(Intent::Import, Stage::Migrate);
        ctx.options.exclude_spam = true;
        let (_, where_clause) = PageCursor::new(&ctx, "_mig_wp_options").filters();
        assert!(where_clause.contains("`option_name` != 'wpmdb_settings'"));
        assert_eq!(PageCursor::new(&ctx, "_mig_wp_comments").filters().1, "WHERE 1=1");
    }

    #[test]
    fn test_hooks_rewrite_fragments() {
        let mut ctx = context(Intent::Push, Stage::Migrate);
        ctx.hooks.rows_where = Some(Arc::new(|w: String, _: &str| format!("{w} AND 2=2")));
        ctx.hooks.rows_sql = Some(Arc::new(|sql: String, table: &str| format!("{sql} /* {table} */")));
        let structure = posts_structure();
        let mut keys = PrimaryKeyState::from_structure(&structure);
        let sql = PageCursor::new(&ctx, "wp_posts").next_page(0, &structure, &mut keys);
        assert!(sql.contains("WHERE 1=1 AND 2=2 ORDER BY"));
        assert!(sql.ends_with("/* wp_posts */"));
    }
}
