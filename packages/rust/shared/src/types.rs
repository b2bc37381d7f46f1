//! Core domain types for SSI Replace.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Well-known name of the document the fragments are injected into.
pub const INDEX_HTML: &str = "index.html";

/// Per-fragment request timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

/// Built-in include markers for header, footer and sidebar, in that order.
pub const DEFAULT_SSI_TAGS: [&str; 3] = [
    "<!--#include virtual='header.html' -->",
    "<!--#include virtual='footer.html' -->",
    "<!--#include virtual='sidebar.html' -->",
];

// ---------------------------------------------------------------------------
// BuildMode
// ---------------------------------------------------------------------------

/// Mode of the host build. Only `Development` activates the plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    #[default]
    Production,
    None,
}

impl BuildMode {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown build mode '{other}': expected 'development', 'production', or 'none'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// FetchOutcome
// ---------------------------------------------------------------------------

/// Result of fetching one fragment. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response body, used verbatim.
    Success(String),
    /// Human-readable reason, including the URL.
    Failure(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Fetched text, if the fetch succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            Self::Failure(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SubstitutionSpec
// ---------------------------------------------------------------------------

/// One marker and the URL whose content replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionEntry {
    pub marker: String,
    pub source_url: String,
}

/// Ordered, positionally paired markers and source URLs.
///
/// Built once per pass and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionSpec {
    entries: Vec<SubstitutionEntry>,
}

impl SubstitutionSpec {
    /// Pair the Nth marker with the Nth URL. Extra items on either side are dropped.
    pub fn pair<M, U>(markers: M, urls: U) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        U: IntoIterator,
        U::Item: Into<String>,
    {
        let entries = markers
            .into_iter()
            .zip(urls)
            .map(|(marker, url)| SubstitutionEntry {
                marker: marker.into(),
                source_url: url.into(),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SubstitutionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Source URLs in marker order.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.source_url.as_str())
    }
}

impl<'a> IntoIterator for &'a SubstitutionSpec {
    type Item = &'a SubstitutionEntry;
    type IntoIter = std::slice::Iter<'a, SubstitutionEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
