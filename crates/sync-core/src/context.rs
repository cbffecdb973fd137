use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hooks::MigrationHooks;
use crate::pairs::ReplacePair;

/// What the overall migration is trying to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Export,
    Import,
    Push,
    Pull,
    FindReplace,
    Savefile,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Export => "export",
            Intent::Import => "import",
            Intent::Push => "push",
            Intent::Pull => "pull",
            Intent::FindReplace => "find_replace",
            Intent::Savefile => "savefile",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which phase of the migration a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Backup,
    FindReplace,
    Migrate,
    Import,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Backup => "backup",
            Stage::FindReplace => "find_replace",
            Stage::Migrate => "migrate",
            Stage::Import => "import",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root URLs of one WordPress install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUrls {
    pub site_url: String,
    #[serde(default)]
    pub home_url: Option<String>,
    /// Absolute filesystem path of the install, used in dump headers.
    #[serde(default)]
    pub path: Option<String>,
}

impl SiteUrls {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            home_url: None,
            path: None,
        }
    }

    /// The home URL when set, otherwise the site URL.
    pub fn home_or_site(&self) -> &str {
        self.home_url.as_deref().unwrap_or(&self.site_url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDetails {
    pub local: SiteUrls,
    #[serde(default)]
    pub remote: Option<SiteUrls>,
}

/// Details of an uploaded dump that is being imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Scheme of the site the dump was taken from, without `://`.
    pub protocol: String,
    /// Site URL recorded in the dump header.
    pub url: String,
}

/// Multisite network settings of the local install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultisiteConfig {
    pub enabled: bool,
    pub subdomain_install: bool,
    /// Network domain of the running install.
    pub domain_current_site: String,
    /// Network path of the running install.
    pub path_current_site: String,
    /// Base domain that subdomain sites are moved under.
    pub domain_replace: Option<String>,
    /// Network domain to write into `site`/`blogs` rows, when known up front.
    pub new_domain_current_site: Option<String>,
    /// Network path to write into `site`/`blogs` rows, when known up front.
    pub new_path_current_site: Option<String>,
}

/// Feature toggles and tunables of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    pub rows_per_segment: usize,
    pub maximum_chunk_size: usize,
    pub max_insert_string_len: usize,
    pub table_prefix: String,
    pub temp_prefix: String,
    pub replace_guids: bool,
    pub exclude_spam: bool,
    pub exclude_post_types: Vec<String>,
    pub exclude_transients: bool,
    pub keep_active_plugins: bool,
    pub gzip_file: bool,
    pub strip_invalid_text: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            rows_per_segment: 100,
            maximum_chunk_size: 1024 * 1024,
            max_insert_string_len: 50_000,
            table_prefix: "wp_".to_string(),
            temp_prefix: "_mig_".to_string(),
            replace_guids: false,
            exclude_spam: false,
            exclude_post_types: Vec::new(),
            exclude_transients: false,
            keep_active_plugins: false,
            gzip_file: false,
            strip_invalid_text: false,
        }
    }
}

/// Everything a step needs to know about the migration it belongs to.
///
/// Built once per run and passed by reference to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationContext {
    pub intent: Intent,
    pub stage: Stage,
    #[serde(default)]
    pub pairs: Vec<ReplacePair>,
    #[serde(default)]
    pub site_details: SiteDetails,
    #[serde(default)]
    pub import_info: Option<ImportInfo>,
    #[serde(default)]
    pub multisite: MultisiteConfig,
    #[serde(default)]
    pub options: MigrationOptions,
    /// Classes that may be instantiated when decoding serialized objects.
    /// `None` allows every class.
    #[serde(default)]
    pub known_classes: Option<Vec<String>>,
    #[serde(skip)]
    pub hooks: MigrationHooks,
}

impl MigrationContext {
    pub fn new(intent: Intent, stage: Stage) -> Self {
        Self {
            intent,
            stage,
            pairs: Vec::new(),
            site_details: SiteDetails::default(),
            import_info: None,
            multisite: MultisiteConfig::default(),
            options: MigrationOptions::default(),
            known_classes: None,
            hooks: MigrationHooks::default(),
        }
    }

    pub fn with_pairs<I, P>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ReplacePair>,
    {
        self.pairs = pairs.into_iter().map(Into::into).collect();
        self
    }

    /// True when SQL is written for a local backup or a downloadable dump.
    pub fn is_backup(&self) -> bool {
        self.intent == Intent::Savefile || self.stage == Stage::Backup
    }

    pub fn search_terms(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.search.as_str())
    }

    pub fn replace_terms(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.replace.as_str())
    }

    /// Prefixed name of a core table, e.g. `options` -> `wp_options`.
    pub fn prefixed(&self, table: &str) -> String {
        format!("{}{}", self.options.table_prefix, table)
    }

    /// Name of the staging copy of `table`.
    pub fn temp_name(&self, table: &str) -> String {
        format!("{}{}", self.options.temp_prefix, table)
    }
}
