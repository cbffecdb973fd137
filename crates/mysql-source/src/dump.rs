//! Banner at the top of a dump file.

use chrono::{DateTime, Utc};
use sync_core::{backquote, MigrationContext};

use crate::accessor::DbAccessor;
use crate::cache::MigrationCache;
use crate::error::DbError;

const CHARSET: &str = "utf8";

/// Post types stored in the database: `revision` first, then every distinct
/// `post_type` of the posts tables, each once.
pub async fn fetch_post_types(
    db: &dyn DbAccessor,
    context: &MigrationContext,
) -> Result<Vec<String>, DbError> {
    let prefix = &context.options.table_prefix;
    let mut tables = vec![context.prefixed("posts")];
    if context.multisite.enabled {
        for entry in db.list_tables().await? {
            let is_site_posts = entry
                .name
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix("_posts"))
                .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()));
            if is_site_posts && !entry.is_view {
                tables.push(entry.name);
            }
        }
    }

    let mut post_types = vec!["revision".to_string()];
    for table in tables {
        let rows = db
            .query(&format!("SELECT DISTINCT `post_type` FROM {}", backquote(&table)))
            .await?;
        for post_type in rows.iter().filter_map(|row| row.text("post_type")) {
            if !post_types.contains(&post_type) {
                post_types.push(post_type);
            }
        }
    }
    Ok(post_types)
}

/// `addslashes` then HTML-escaped, as header values are written.
fn header_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '"' => out.push_str("\\&quot;"),
            '\'' => out.push_str("\\&#039;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// The replacement for `value` when a pair searches for it exactly.
fn replaced<'a>(context: &'a MigrationContext, value: &str) -> Option<&'a str> {
    context
        .pairs
        .iter()
        .find(|pair| pair.search == value)
        .map(|pair| pair.replace.as_str())
}

/// Banner written before the first table of a dump.
///
/// `tables` are the tables included in the dump. The URL and path are shown
/// as they will be after the migration when a pair targets them.
pub async fn backup_header(
    context: &MigrationContext,
    db: &dyn DbAccessor,
    cache: &mut MigrationCache,
    tables: &[String],
    generated: DateTime<Utc>,
) -> Result<String, DbError> {
    let local = &context.site_details.local;
    let home_url = local.home_or_site();
    let bare_url = home_url
        .strip_prefix("https:")
        .or_else(|| home_url.strip_prefix("http:"))
        .unwrap_or(home_url);
    let url = replaced(context, bare_url)
        .or_else(|| replaced(context, home_url))
        .unwrap_or(bare_url);

    let path = local.path.as_deref().unwrap_or_default();
    let path = replaced(context, path).unwrap_or(path);

    let post_types = cache.post_types(db, context).await?;
    let protocol = if home_url.starts_with("https") {
        "https"
    } else {
        "http"
    };

    let mut header = String::new();
    header.push_str("# WordPress MySQL database migration\n");
    header.push_str("#\n");
    header.push_str(&format!(
        "# Generated: {}\n",
        generated.format("%A %-d. %B %Y %H:%M %Z")
    ));
    header.push_str(&format!("# Hostname: {}\n", db.host_name()));
    header.push_str(&format!("# Database: {}\n", backquote(db.database_name())));
    header.push_str(&format!("# URL: {}\n", header_value(url)));
    header.push_str(&format!("# Path: {}\n", header_value(path)));
    header.push_str(&format!("# Tables: {}\n", tables.join(", ")));
    header.push_str(&format!("# Table Prefix: {}\n", context.options.table_prefix));
    header.push_str(&format!("# Post Types: {}\n", post_types.join(", ")));
    header.push_str(&format!("# Protocol: {protocol}\n"));
    header.push_str(&format!("# Multisite: {}\n", context.multisite.enabled));
    header.push_str("# Subsite Export: false\n");
    header.push_str("# --------------------------------------------------------\n\n");
    header.push_str(&format!("/*!40101 SET NAMES {CHARSET} */;\n\n"));
    header.push_str("SET sql_mode='NO_AUTO_VALUE_ON_ZERO';\n\n");
    Ok(header)
}
