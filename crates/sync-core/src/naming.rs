use regex::Regex;
use std::collections::HashMap;

/// Wraps an identifier in backticks, doubling any embedded backtick.
pub fn backquote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Whether `table` is the core table `desired` under `prefix`, including the
/// per-site copies of a multisite network (`wp_2_options`).
pub fn table_is(desired: &str, table: &str, prefix: &str) -> bool {
    if desired.is_empty() {
        return false;
    }
    if table == format!("{prefix}{desired}") {
        return true;
    }
    let pattern = format!(
        "^{}[0-9]+_{}$",
        regex::escape(prefix),
        regex::escape(desired)
    );
    Regex::new(&pattern)
        .map(|re| re.is_match(table))
        .unwrap_or(false)
}

/// Resolves unprefixed core table names against the site that owns
/// `queried_table`.
///
/// On a network, `wp_3_comments` maps `posts` to `wp_3_posts`; the main site
/// and single installs map to the plain prefix.
pub fn ms_compat_table_names(
    tables: &[&str],
    queried_table: &str,
    prefix: &str,
    multisite: bool,
) -> HashMap<String, String> {
    let mut site_prefix = prefix.to_string();
    if multisite {
        let pattern = format!("^{}([0-9]+)_", regex::escape(prefix));
        if let Some(caps) = Regex::new(&pattern)
            .ok()
            .and_then(|re| re.captures(queried_table))
        {
            if let Some(blog_id) = caps.get(1).filter(|id| id.as_str() != "1") {
                site_prefix = format!("{prefix}{}_", blog_id.as_str());
            }
        }
    }
    tables
        .iter()
        .map(|t| (t.to_string(), format!("{site_prefix}{t}")))
        .collect()
}
