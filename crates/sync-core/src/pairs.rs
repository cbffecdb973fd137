use serde::{Deserialize, Serialize};

/// One find/replace pair.
///
/// Pairs are applied left to right, each over the output of the previous one,
/// so later pairs see text already rewritten by earlier pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacePair {
    pub search: String,
    pub replace: String,
}

impl ReplacePair {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

impl From<(&str, &str)> for ReplacePair {
    fn from((search, replace): (&str, &str)) -> Self {
        Self::new(search, replace)
    }
}
