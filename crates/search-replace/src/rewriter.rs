use regex::bytes::Regex;
use sync_core::{table_is, Intent, MigrationContext, MigrationHooks, ReplacePair};
use tracing::warn;

use crate::bytes::{contains_ignore_ascii_case, find_ignore_ascii_case, ireplace_pairs};
use crate::json::json_encode_trim;
use crate::url::parse_url;

/// Applies the replace pairs of a migration to single strings.
///
/// A rewriter is registered for one table and pointed at each column in
/// turn with [`Rewriter::set_column`]. When it first runs on a JSON-aware
/// column it appends the JSON-escaped form of every pair to its pair list;
/// that merge sticks for the rest of the rewriter's life.
#[derive(Debug, Clone)]
pub struct Rewriter {
    table: String,
    column: String,
    table_prefix: String,
    search: Vec<Vec<u8>>,
    replace: Vec<Vec<u8>>,
    json_search: Vec<Vec<u8>>,
    json_replace: Vec<Vec<u8>>,
    json_tables: Vec<String>,
    json_columns: Vec<String>,
    json_merged: bool,
    subdomain: Option<SubdomainRewrite>,
    protocol: Option<ProtocolRewrite>,
}

/// `//sub.site-domain` to `//sub.base-domain` on subdomain networks.
#[derive(Debug, Clone)]
struct SubdomainRewrite {
    pattern: Regex,
    replacement: Vec<u8>,
}

/// `<source scheme>://<destination>` to the real destination URL.
#[derive(Debug, Clone)]
struct ProtocolRewrite {
    search: Vec<u8>,
    replace: Vec<u8>,
}

impl Rewriter {
    /// Builds the rewriter for `table` from the migration context.
    pub fn register(context: &MigrationContext, table: &str) -> Self {
        let prefix = &context.options.table_prefix;
        let default_tables = match context.intent {
            Intent::FindReplace | Intent::Import => {
                vec![format!("{}{}posts", context.options.temp_prefix, prefix)]
            }
            _ => vec![format!("{prefix}posts")],
        };
        let json_tables = MigrationHooks::list(&context.hooks.json_replace_tables, default_tables);
        let json_columns = MigrationHooks::list(
            &context.hooks.json_replace_columns,
            vec!["post_content".to_string(), "post_content_filtered".to_string()],
        );

        let mut rewriter = Self::with_pairs(&context.pairs);
        rewriter.table = table.to_string();
        rewriter.table_prefix = prefix.clone();
        rewriter.json_tables = json_tables;
        rewriter.json_columns = json_columns;
        rewriter.subdomain = SubdomainRewrite::detect(context);
        rewriter.protocol = ProtocolRewrite::detect(context);
        rewriter
    }

    /// A rewriter with only the plain pairs: no JSON-aware columns, no
    /// subdomain or protocol rules.
    pub fn with_pairs(pairs: &[ReplacePair]) -> Self {
        let search: Vec<Vec<u8>> = pairs.iter().map(|p| p.search.as_bytes().to_vec()).collect();
        let replace: Vec<Vec<u8>> = pairs.iter().map(|p| p.replace.as_bytes().to_vec()).collect();
        let json_search = search.iter().map(|s| json_encode_trim(s)).collect();
        let json_replace = replace.iter().map(|r| json_encode_trim(r)).collect();
        Self {
            table: String::new(),
            column: String::new(),
            table_prefix: String::new(),
            search,
            replace,
            json_search,
            json_replace,
            json_tables: Vec::new(),
            json_columns: Vec::new(),
            json_merged: false,
            subdomain: None,
            protocol: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn set_column(&mut self, column: &str) {
        column.clone_into(&mut self.column);
    }

    /// Whether the current table is the core table `desired`.
    pub fn table_is(&self, desired: &str) -> bool {
        table_is(desired, &self.table, &self.table_prefix)
    }

    pub fn is_json_column(&self) -> bool {
        self.json_tables.iter().any(|t| *t == self.table)
            && self.json_columns.iter().any(|c| *c == self.column)
    }

    pub fn has_subdomain_rewrite(&self) -> bool {
        self.subdomain.is_some()
    }

    pub fn has_protocol_rewrite(&self) -> bool {
        self.protocol.is_some()
    }

    /// Rewrites one string. Subjects with no matches come back unchanged.
    pub fn apply(&mut self, subject: &[u8]) -> Vec<u8> {
        if self.search.is_empty() && self.replace.is_empty() {
            return subject.to_vec();
        }
        self.maybe_merge_json_replaces();

        let pairs = self
            .search
            .iter()
            .zip(&self.replace)
            .map(|(s, r)| (s.as_slice(), r.as_slice()));
        let mut new = ireplace_pairs(subject, pairs);

        if let Some(subdomain) = &self.subdomain {
            new = subdomain.apply(&new);
        }
        if let Some(protocol) = &self.protocol {
            new = protocol.apply(&new, self.is_json_column());
        }
        new
    }

    fn maybe_merge_json_replaces(&mut self) {
        if self.json_merged || !self.is_json_column() {
            return;
        }
        self.search.extend(self.json_search.iter().cloned());
        self.replace.extend(self.json_replace.iter().cloned());
        self.json_merged = true;
    }
}

impl SubdomainRewrite {
    fn detect(context: &MigrationContext) -> Option<Self> {
        let multisite = &context.multisite;
        if !multisite.enabled || !multisite.subdomain_install {
            return None;
        }
        let base = multisite.domain_replace.as_deref().unwrap_or("");
        let site = multisite.domain_current_site.as_str();
        // A base domain that already contains the site domain would produce
        // doubled replacements.
        let same_base = find_ignore_ascii_case(base.as_bytes(), site.as_bytes(), 0)
            .is_some_and(|pos| pos > 0);
        let enabled = context.hooks.subdomain_replaces.as_ref().map_or(true, |hook| hook());
        if same_base || !enabled || base.is_empty() {
            return None;
        }

        let pattern = format!(r"//((?-u:.)*?)\.{}", regex::escape(site));
        match Regex::new(&pattern) {
            Ok(pattern) => Some(Self {
                pattern,
                replacement: format!("//${{1}}.{}", base.trim().replace('$', "$$")).into_bytes(),
            }),
            Err(e) => {
                warn!("Subdomain rewrite disabled, invalid site domain {site:?}: {e}");
                None
            }
        }
    }

    fn apply(&self, subject: &[u8]) -> Vec<u8> {
        self.pattern
            .replace_all(subject, self.replacement.as_slice())
            .into_owned()
    }
}

impl ProtocolRewrite {
    fn detect(context: &MigrationContext) -> Option<Self> {
        let local = context.site_details.local.home_or_site().to_string();
        let remote = if context.intent == Intent::Import {
            let info = context.import_info.as_ref()?;
            format!("{}:{}", info.protocol, info.url)
        } else {
            context.site_details.remote.as_ref()?.home_or_site().to_string()
        };

        let local_https = contains_ignore_ascii_case(local.as_bytes(), b"https");
        let remote_https = contains_ignore_ascii_case(remote.as_bytes(), b"https");
        if local_https == remote_https {
            return None;
        }
        let scheme = |https: bool| if https { "https" } else { "http" };
        let (source_scheme, destination_url) = if context.intent == Intent::Push {
            (scheme(local_https), remote)
        } else {
            (scheme(remote_https), local)
        };

        if let Some(hook) = &context.hooks.replace_destination_protocol {
            if !hook(&destination_url) {
                return None;
            }
        }

        let search = format!(
            "{source_scheme}://{}",
            parse_url(&destination_url).without_scheme()
        );
        Some(Self {
            search: search.into_bytes(),
            replace: destination_url.into_bytes(),
        })
    }

    fn apply(&self, subject: &[u8], json_aware: bool) -> Vec<u8> {
        let json_search = json_encode_trim(&self.search);
        let json_replace = json_encode_trim(&self.replace);
        let mut pairs = vec![(self.search.as_slice(), self.replace.as_slice())];
        if json_aware {
            pairs.push((json_search.as_slice(), json_replace.as_slice()));
        }
        ireplace_pairs(subject, pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use sync_core::{ImportInfo, SiteUrls, Stage};

    fn context(intent: Intent, pairs: &[(&str, &str)]) -> MigrationContext {
        MigrationContext::new(intent, Stage::Migrate).with_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_plain_replace() {
        let ctx = context(Intent::Push, &[("http://old.com", "http://new.com")]);
        let mut rewriter = Rewriter::register(&ctx, "wp_posts");
        rewriter.set_column("post_title");
        assert_eq!(rewriter.apply(b"See http://old.com/x"), b"See http://new.com/x".to_vec());
        assert_eq!(rewriter.apply(b"SEE HTTP://OLD.COM"), b"SEE http://new.com".to_vec());
        assert_eq!(rewriter.apply(b"nothing here"), b"nothing here".to_vec());
    }

    #[test]
    fn test_no_pairs_is_identity() {
        let mut ctx = context(Intent::Pull, &[]);
        ctx.multisite.enabled = true;
        ctx.multisite.subdomain_install = true;
        ctx.multisite.domain_current_site = "old.com".into();
        ctx.multisite.domain_replace = Some("new.local".into());
        let mut rewriter = Rewriter::register(&ctx, "wp_posts");
        assert_eq!(rewriter.apply(b"//blog.old.com"), b"//blog.old.com".to_vec());
    }

    #[test]
    fn test_json_variants_only_on_json_columns() {
        let ctx = context(Intent::Push, &[("http://old.com", "http://new.com")]);
        let mut rewriter = Rewriter::register(&ctx, "wp_posts");
        let escaped = br#"{"url":"http:\/\/old.com\/a"}"#;

        rewriter.set_column("post_excerpt");
        assert_eq!(rewriter.apply(escaped), escaped.to_vec());

        rewriter.set_column("post_content");
        assert_eq!(
            rewriter.apply(escaped),
            br#"{"url":"http:\/\/new.com\/a"}"#.to_vec()
        );

        // The merge is sticky for this rewriter instance.
        rewriter.set_column("post_excerpt");
        assert_eq!(
            rewriter.apply(escaped),
            br#"{"url":"http:\/\/new.com\/a"}"#.to_vec()
        );
    }

    #[test]
    fn test_json_tables_follow_staging_names() {
        let ctx = context(Intent::FindReplace, &[("a/b", "c/d")]);
        let mut staged = Rewriter::register(&ctx, "_mig_wp_posts");
        staged.set_column("post_content");
        assert!(staged.is_json_column());
        assert_eq!(staged.apply(br"a\/b"), br"c\/d".to_vec());

        let live = Rewriter::register(&ctx, "wp_posts");
        assert!(!live.is_json_column());
    }

    #[test]
    fn test_subdomain_rewrite() {
        let mut ctx = context(Intent::Pull, &[("//old.com", "//new.local")]);
        ctx.multisite.enabled = true;
        ctx.multisite.subdomain_install = true;
        ctx.multisite.domain_current_site = "old.com".into();
        ctx.multisite.domain_replace = Some("new.local".into());
        let mut rewriter = Rewriter::register(&ctx, "wp_2_posts");
        assert!(rewriter.has_subdomain_rewrite());
        assert_eq!(
            rewriter.apply(b"//blog.old.com/path"),
            b"//blog.new.local/path".to_vec()
        );
        assert_eq!(rewriter.apply(b"//old.com/path"), b"//new.local/path".to_vec());
    }

    #[test]
    fn test_subdomain_rewrite_skipped_for_same_base() {
        let mut ctx = context(Intent::Pull, &[("//old.com", "//dev.old.com")]);
        ctx.multisite.enabled = true;
        ctx.multisite.subdomain_install = true;
        ctx.multisite.domain_current_site = "old.com".into();
        ctx.multisite.domain_replace = Some("dev.old.com".into());
        assert!(!Rewriter::register(&ctx, "wp_posts").has_subdomain_rewrite());

        ctx.multisite.domain_replace = Some("new.local".into());
        ctx.hooks.subdomain_replaces = Some(Arc::new(|| false));
        assert!(!Rewriter::register(&ctx, "wp_posts").has_subdomain_rewrite());
    }

    #[test]
    fn test_protocol_mismatch_on_pull() {
        let mut ctx = context(Intent::Pull, &[("//remote.com", "//local.test")]);
        ctx.site_details.local = SiteUrls::new("https://local.test");
        ctx.site_details.remote = Some(SiteUrls::new("http://remote.com"));
        let mut rewriter = Rewriter::register(&ctx, "wp_posts");
        rewriter.set_column("post_content");
        assert!(rewriter.has_protocol_rewrite());
        assert_eq!(
            rewriter.apply(b"<a href=\"http://remote.com/x\">"),
            b"<a href=\"https://local.test/x\">".to_vec()
        );
        assert_eq!(
            rewriter.apply(br#"{"u":"http:\/\/remote.com"}"#),
            br#"{"u":"https:\/\/local.test"}"#.to_vec()
        );
    }

    #[test]
    fn test_protocol_mismatch_on_push_targets_remote() {
        let mut ctx = context(Intent::Push, &[("//local.test", "//remote.com")]);
        ctx.site_details.local = SiteUrls::new("http://local.test");
        ctx.site_details.remote = Some(SiteUrls::new("https://remote.com"));
        let mut rewriter = Rewriter::register(&ctx, "wp_options");
        assert_eq!(
            rewriter.apply(b"http://local.test/page"),
            b"https://remote.com/page".to_vec()
        );

        ctx.hooks.replace_destination_protocol = Some(Arc::new(|_: &str| false));
        let mut disabled = Rewriter::register(&ctx, "wp_options");
        assert_eq!(
            disabled.apply(b"http://local.test/page"),
            b"http://remote.com/page".to_vec()
        );
    }

    #[test]
    fn test_protocol_mismatch_on_import() {
        let mut ctx = context(Intent::Import, &[("//dump.com", "//local.test")]);
        ctx.site_details.local = SiteUrls::new("https://local.test");
        assert!(!Rewriter::register(&ctx, "wp_posts").has_protocol_rewrite());

        ctx.import_info = Some(ImportInfo {
            protocol: "http".into(),
            url: "//dump.com".into(),
        });
        let mut rewriter = Rewriter::register(&ctx, "wp_posts");
        assert_eq!(rewriter.apply(b"http://dump.com"), b"https://local.test".to_vec());
    }

    #[test]
    fn test_table_is_uses_prefix() {
        let ctx = context(Intent::Push, &[]);
        assert!(Rewriter::register(&ctx, "wp_3_options").table_is("options"));
        assert!(!Rewriter::register(&ctx, "wp_posts").table_is("options"));
    }
}
