//! Row encoding: one fetched row to a VALUES tuple or an UPDATE statement.

use mysql_types::forward::{bit_literal, escape_mimic, quote_insert, unhex_literal};
use mysql_types::schema::{bit_shadow, hex_shadow};
use mysql_types::TableStructure;
use search_replace::url::parse_url;
use search_replace::{ClassPolicy, Rewriter, ValueCodec};
use sync_core::{backquote, table_is, Intent, MigrationContext, Row, Stage};

/// The SQL produced for one row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedRow {
    /// `(v1, v2, ...),\n`, `UPDATE ...;\n`, or empty when the row produces
    /// nothing.
    pub sql: Vec<u8>,
    pub is_update: bool,
}

/// Encodes the rows of one table.
///
/// Outside the find_replace stage every row becomes a VALUES tuple for the
/// INSERT template. In the find_replace stage rows are updated in place and
/// only rows whose values change produce a statement.
pub struct RowEncoder<'a> {
    context: &'a MigrationContext,
    structure: &'a TableStructure,
    table: &'a str,
    codec: ValueCodec,
    multisite_identity: bool,
    rewrite_guids: bool,
}

impl<'a> RowEncoder<'a> {
    /// `table` is the source table; `temp_table` the staging table, which
    /// is what the rewriter sees in the find_replace stage.
    pub fn new(
        context: &'a MigrationContext,
        structure: &'a TableStructure,
        table: &'a str,
        temp_table: &str,
    ) -> Self {
        let rewrite_table = if context.stage == Stage::FindReplace {
            temp_table
        } else {
            table
        };
        let codec = ValueCodec::new(
            Rewriter::register(context, rewrite_table),
            ClassPolicy::from_context(context),
        );

        let identity_tables = [
            context.prefixed("site"),
            context.prefixed("blogs"),
            context.temp_name(&context.prefixed("blogs")),
            context.temp_name(&context.prefixed("site")),
        ];
        let multisite_identity = context.multisite.enabled
            && context.stage != Stage::Backup
            && identity_tables.iter().any(|t| t == table);
        let rewrite_guids =
            context.options.replace_guids && table_is("posts", table, &context.options.table_prefix);

        Self {
            context,
            structure,
            table,
            codec,
            multisite_identity,
            rewrite_guids,
        }
    }

    /// Encodes `row`. `primary_keys` are the columns identifying the row in
    /// an UPDATE.
    pub fn encode<'k, I>(&mut self, row: &Row, primary_keys: I) -> EncodedRow
    where
        I: IntoIterator<Item = &'k str> + Clone,
    {
        let context = self.context;
        let is_update = context.stage == Stage::FindReplace;
        if !context
            .hooks
            .accepts_row(row, self.table, context.intent, context.stage)
        {
            return EncodedRow {
                sql: Vec::new(),
                is_update,
            };
        }

        let mut values: Vec<Vec<u8>> = Vec::new();
        let mut updates: Vec<Vec<u8>> = Vec::new();
        let mut wheres: Vec<Vec<u8>> = Vec::new();

        for (column, cell) in row.iter() {
            if self.structure.is_shadow(column) {
                continue;
            }

            if is_update && primary_keys.clone().into_iter().any(|pk| pk == column) {
                let original = cell.as_deref().unwrap_or_default();
                wheres.push(quoted_assignment(column, &escape_mimic(original)));
                continue;
            }

            self.codec.set_column(column);

            if self.structure.is_integer(column) {
                let raw = cell.as_deref().filter(|v| !v.is_empty());
                let value = match raw {
                    Some(v) => v.to_vec(),
                    None => self
                        .structure
                        .integer_default(column)
                        .unwrap_or("NULL")
                        .as_bytes()
                        .to_vec(),
                };
                values.push(if value.is_empty() { b"''".to_vec() } else { value });
                continue;
            }

            let bit_key = bit_shadow(column);
            if cell.is_none() && !row.contains(&bit_key) {
                values.push(b"NULL".to_vec());
                continue;
            }

            if self.structure.is_binary(column) {
                if let Some(Some(hex)) = row.get(&hex_shadow(column)) {
                    values.push(unhex_literal(hex));
                    continue;
                }
            }

            if self.structure.is_bit(column) {
                let shadow = row.get(&bit_key).and_then(|c| c.as_deref());
                values.push(bit_literal(shadow));
                continue;
            }

            let original = cell.as_deref().unwrap_or_default();
            let mut value = original.to_vec();

            if self.multisite_identity {
                value = match column {
                    "path" => self.rewrite_path(value),
                    "domain" => self.rewrite_domain(value, original),
                    _ => value,
                };
            }

            if (column != "guid" || self.rewrite_guids) && context.stage != Stage::Backup {
                value = self.codec.transform(&value);
            }

            if is_update {
                let after = escape_mimic(&value);
                if after != escape_mimic(original) {
                    updates.push(quoted_assignment(column, &after));
                }
                let mut quoted = vec![b'\''];
                quoted.extend(after);
                quoted.push(b'\'');
                values.push(quoted);
            } else {
                values.push(quote_insert(&value));
            }
        }

        let sql = if is_update {
            if updates.is_empty() || wheres.is_empty() {
                Vec::new()
            } else {
                self.update_statement(&updates, &wheres)
            }
        } else {
            let mut tuple = b"(".to_vec();
            tuple.extend(values.join(&b", "[..]));
            tuple.extend_from_slice(b"),\n");
            tuple
        };
        EncodedRow { sql, is_update }
    }

    fn update_statement(&self, updates: &[Vec<u8>], wheres: &[Vec<u8>]) -> Vec<u8> {
        let table = match self.context.intent {
            Intent::Import => backquote(self.table),
            _ => backquote(&self.context.temp_name(self.table)),
        };
        let mut sql = format!("UPDATE {table} SET ").into_bytes();
        sql.extend(updates.join(&b", "[..]));
        sql.extend_from_slice(b" WHERE ");
        sql.extend(wheres.join(&b" AND "[..]));
        sql.extend_from_slice(b";\n");
        sql
    }

    /// Swaps the network path in a `site`/`blogs` row.
    fn rewrite_path(&self, value: Vec<u8>) -> Vec<u8> {
        let context = self.context;
        let old = context.multisite.path_current_site.as_str();
        let new = match context.multisite.new_path_current_site.as_deref() {
            Some(path) if !path.is_empty() => path.to_string(),
            _ if context.stage == Stage::FindReplace => old.to_string(),
            _ => match context.pairs.first().filter(|p| !p.replace.is_empty()) {
                Some(pair) => parse_url(&pair.replace).path_with_slashes(),
                None => String::new(),
            },
        };
        if new.is_empty() || old.is_empty() || old == new {
            return value;
        }
        match find(&value, old.as_bytes()) {
            Some(pos) => {
                let mut out = value[..pos].to_vec();
                out.extend_from_slice(new.as_bytes());
                out.extend_from_slice(&value[pos + old.len()..]);
                out
            }
            None => value,
        }
    }

    /// Swaps the network domain in a `site`/`blogs` row.
    fn rewrite_domain(&self, value: Vec<u8>, original: &[u8]) -> Vec<u8> {
        let context = self.context;
        let multisite = &context.multisite;
        let replacement = match multisite.new_domain_current_site.as_deref() {
            Some(domain) if !domain.is_empty() => Some(domain.to_string()),
            _ if context.stage == Stage::FindReplace || context.intent == Intent::Savefile => {
                Some(
                    multisite
                        .domain_replace
                        .clone()
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| multisite.domain_current_site.clone()),
                )
            }
            _ => context
                .pairs
                .first()
                .filter(|p| !p.replace.is_empty())
                .and_then(|p| parse_url(&p.replace).host),
        };
        let Some(replacement) = replacement else {
            return value;
        };

        let mut search = multisite.domain_current_site.as_bytes().to_vec();
        if context.stage == Stage::FindReplace && !original.is_empty() {
            let searched = context.search_terms().any(|term| {
                let bare = ["//", "http://", "https://"]
                    .iter()
                    .find_map(|scheme| term.strip_prefix(scheme))
                    .unwrap_or(term);
                bare.as_bytes().starts_with(original)
            });
            if searched {
                search = original.to_vec();
            }
        }
        if search.is_empty() {
            return value;
        }
        replace_all(&value, &search, replacement.as_bytes())
    }
}

/// `` `column` = "value" `` with an already escaped value.
fn quoted_assignment(column: &str, escaped: &[u8]) -> Vec<u8> {
    let mut out = format!("{} = \"", backquote(column)).into_bytes();
    out.extend_from_slice(escaped);
    out.push(b'"');
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = find(rest, needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_types::ColumnDescriptor;
    use std::sync::Arc;
    use sync_core::MigrationHooks;

    fn posts() -> TableStructure {
        TableStructure::inspect(
            &[
                ColumnDescriptor::new("ID", "bigint(20) unsigned", "PRI", None),
                ColumnDescriptor::new("post_parent", "bigint(20)", "", None),
                ColumnDescriptor::new("menu_order", "int(11)", "", Some("0")),
                ColumnDescriptor::new("post_content", "longtext", "", None),
                ColumnDescriptor::new("guid", "varchar(255)", "", None),
            ],
            &MigrationHooks::default(),
        )
    }

    fn push_context() -> MigrationContext {
        MigrationContext::new(Intent::Push, Stage::Migrate)
            .with_pairs([("http://old.com", "http://new.com")])
    }

    fn text(encoded: &EncodedRow) -> String {
        String::from_utf8(encoded.sql.clone()).unwrap()
    }

    #[test]
    fn test_insert_tuple() {
        let ctx = push_context();
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_posts", "_mig_wp_posts");
        let row = Row::new()
            .with("ID", Some("5"))
            .with("post_parent", Some(""))
            .with("menu_order", None)
            .with("post_content", Some("See http://old.com/x, it's\nnew"))
            .with("guid", Some("http://old.com/?p=5"));

        let encoded = encoder.encode(&row, ["ID"]);
        assert!(!encoded.is_update);
        assert_eq!(
            text(&encoded),
            "(5, NULL, 0, 'See http://new.com/x, it\\'s\\nnew', 'http://old.com/?p=5'),\n"
        );
    }

    #[test]
    fn test_guids_rewritten_on_request() {
        let mut ctx = push_context();
        ctx.options.replace_guids = true;
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_posts", "_mig_wp_posts");
        let row = Row::new().with("guid", Some("http://old.com/?p=5"));
        assert_eq!(text(&encoder.encode(&row, ["ID"])), "('http://new.com/?p=5'),\n");
    }

    #[test]
    fn test_binary_and_bit_shadows() {
        let ctx = push_context();
        let structure = TableStructure::inspect(
            &[
                ColumnDescriptor::new("token", "binary(5)", "", None),
                ColumnDescriptor::new("flags", "bit(3)", "", None),
                ColumnDescriptor::new("empty_flags", "bit(3)", "", None),
                ColumnDescriptor::new("note", "text", "", None),
            ],
            &MigrationHooks::default(),
        );
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_tokens", "_mig_wp_tokens");
        let row = Row::new()
            .with("token", Some("Hello"))
            .with("flags", Some("\u{5}"))
            .with("empty_flags", None)
            .with("note", None)
            .with("token__hex", Some("48656C6C6F"))
            .with("flags__bit", Some("5"))
            .with("empty_flags__bit", None);

        assert_eq!(
            text(&encoder.encode(&row, std::iter::empty::<&str>())),
            "(UNHEX('48656C6C6F'), b'101', NULL, NULL),\n"
        );
    }

    #[test]
    fn test_binary_null_leaves_no_shadow_value() {
        let ctx = push_context();
        let structure = TableStructure::inspect(
            &[ColumnDescriptor::new("token", "binary(5)", "", None)],
            &MigrationHooks::default(),
        );
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_tokens", "_mig_wp_tokens");
        let row = Row::new().with("token", None).with("token__hex", None);
        assert_eq!(text(&encoder.encode(&row, std::iter::empty::<&str>())), "(NULL),\n");
    }

    #[test]
    fn test_backup_stage_copies_values() {
        let ctx = MigrationContext::new(Intent::Push, Stage::Backup)
            .with_pairs([("http://old.com", "http://new.com")]);
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_posts", "_mig_wp_posts");
        let row = Row::new().with("post_content", Some("http://old.com"));
        assert_eq!(text(&encoder.encode(&row, ["ID"])), "('http://old.com'),\n");
    }

    #[test]
    fn test_update_only_changed_columns() {
        let ctx = MigrationContext::new(Intent::FindReplace, Stage::FindReplace)
            .with_pairs([("http://old.com", "http://new.com")]);
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_posts", "_mig_wp_posts");

        let row = Row::new()
            .with("ID", Some("9"))
            .with("menu_order", Some("1"))
            .with("post_content", Some("Go to \"http://old.com\""))
            .with("guid", Some("http://old.com/?p=9"));
        let encoded = encoder.encode(&row, ["ID"]);
        assert!(encoded.is_update);
        assert_eq!(
            text(&encoded),
            "UPDATE `_mig_wp_posts` SET `post_content` = \"Go to \\\"http://new.com\\\"\" WHERE `ID` = \"9\";\n"
        );

        let unchanged = Row::new()
            .with("ID", Some("10"))
            .with("post_content", Some("nothing to see"));
        assert!(encoder.encode(&unchanged, ["ID"]).sql.is_empty());
    }

    #[test]
    fn test_update_needs_a_key() {
        let ctx = MigrationContext::new(Intent::FindReplace, Stage::FindReplace)
            .with_pairs([("old", "new")]);
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_posts", "_mig_wp_posts");
        let row = Row::new().with("post_content", Some("old"));
        assert!(encoder.encode(&row, std::iter::empty::<&str>()).sql.is_empty());
    }

    #[test]
    fn test_import_updates_table_in_place() {
        let ctx = MigrationContext::new(Intent::Import, Stage::FindReplace)
            .with_pairs([("old", "new")]);
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "_mig_wp_posts", "_mig_wp_posts");
        let row = Row::new().with("ID", Some("1")).with("post_content", Some("old"));
        assert_eq!(
            text(&encoder.encode(&row, ["ID"])),
            "UPDATE `_mig_wp_posts` SET `post_content` = \"new\" WHERE `ID` = \"1\";\n"
        );
    }

    #[test]
    fn test_vetoed_row_is_empty() {
        let mut ctx = push_context();
        ctx.hooks.table_row = Some(Arc::new(|row: &Row, _: &str, _: Intent, _: Stage| {
            row.text("ID").as_deref() != Some("2")
        }));
        let structure = posts();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_posts", "_mig_wp_posts");
        assert!(encoder
            .encode(&Row::new().with("ID", Some("2")), ["ID"])
            .sql
            .is_empty());
        assert!(!encoder
            .encode(&Row::new().with("ID", Some("3")), ["ID"])
            .sql
            .is_empty());
    }

    fn blogs() -> TableStructure {
        TableStructure::inspect(
            &[
                ColumnDescriptor::new("blog_id", "bigint(20)", "PRI", None),
                ColumnDescriptor::new("domain", "varchar(200)", "", None),
                ColumnDescriptor::new("path", "varchar(100)", "", None),
            ],
            &MigrationHooks::default(),
        )
    }

    #[test]
    fn test_multisite_identity_columns() {
        let mut ctx = MigrationContext::new(Intent::Push, Stage::Migrate)
            .with_pairs([("//old.com", "//new.test/network")]);
        ctx.multisite.enabled = true;
        ctx.multisite.domain_current_site = "old.com".into();
        ctx.multisite.path_current_site = "/".into();
        let structure = blogs();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_blogs", "_mig_wp_blogs");

        let row = Row::new()
            .with("blog_id", Some("2"))
            .with("domain", Some("old.com"))
            .with("path", Some("/shop/"));
        assert_eq!(
            text(&encoder.encode(&row, ["blog_id"])),
            "(2, 'new.test', '/network/shop/'),\n"
        );
    }

    #[test]
    fn test_multisite_identity_uses_configured_values() {
        let mut ctx = MigrationContext::new(Intent::Savefile, Stage::Migrate);
        ctx.multisite.enabled = true;
        ctx.multisite.domain_current_site = "old.com".into();
        ctx.multisite.domain_replace = Some("new.local".into());
        ctx.multisite.path_current_site = "/".into();
        ctx.multisite.new_path_current_site = Some("/sub/".into());
        let structure = blogs();
        let mut encoder = RowEncoder::new(&ctx, &structure, "wp_site", "_mig_wp_site");

        let row = Row::new()
            .with("domain", Some("blog.old.com"))
            .with("path", Some("/"));
        assert_eq!(
            text(&encoder.encode(&row, ["blog_id"])),
            "('blog.new.local', '/sub/'),\n"
        );
    }

    #[test]
    fn test_byte_helpers() {
        assert_eq!(find(b"abcabc", b"ca"), Some(2));
        assert_eq!(find(b"abc", b""), None);
        assert_eq!(replace_all(b"a.b.c", b".", b"::"), b"a::b::c".to_vec());
    }
}
