//! Plugin options and application configuration for SSI Replace.
//!
//! Project config lives at `./ssi-replace.toml`, falling back to
//! `~/.ssi-replace/ssi-replace.toml`. CLI flags override config file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SsiReplaceError};
use crate::types::{BuildMode, DEFAULT_SSI_TAGS, SubstitutionSpec};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ssi-replace.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ssi-replace";

/// Option names as users write them, in header/footer/sidebar order.
const REQUIRED_URLS: [(&str, &str); 3] = [
    ("headerUrl", "header_url"),
    ("footerUrl", "footer_url"),
    ("sidebarUrl", "sidebar_url"),
];

/// Template written by `config init`.
const CONFIG_TEMPLATE: &str = r#"[build]
mode = "development"
dist_dir = "dist"

[plugin]
header_url = "https://example.com/fragments/header.html"
footer_url = "https://example.com/fragments/footer.html"
sidebar_url = "https://example.com/fragments/sidebar.html"
# ssi_tags = [
#   "<!--#include virtual='header.html' -->",
#   "<!--#include virtual='footer.html' -->",
#   "<!--#include virtual='sidebar.html' -->",
# ]
"#;

// ---------------------------------------------------------------------------
// Config structs (matching ssi-replace.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Raw plugin options, validated by [`PluginOptions::validate`].
    #[serde(default)]
    pub plugin: PluginOptions,
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build mode; the plugin is inert unless this is `development`.
    #[serde(default)]
    pub mode: BuildMode,

    /// Directory holding the build output.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            dist_dir: default_dist_dir(),
        }
    }
}

fn default_dist_dir() -> String {
    "dist".into()
}

/// `[plugin]` section: the options bag before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginOptions {
    #[serde(default, alias = "headerUrl", skip_serializing_if = "Option::is_none")]
    pub header_url: Option<String>,

    #[serde(default, alias = "footerUrl", skip_serializing_if = "Option::is_none")]
    pub footer_url: Option<String>,

    #[serde(default, alias = "sidebarUrl", skip_serializing_if = "Option::is_none")]
    pub sidebar_url: Option<String>,

    /// Custom markers replacing [`DEFAULT_SSI_TAGS`], in the same order.
    #[serde(default, alias = "ssiTags", skip_serializing_if = "Option::is_none")]
    pub ssi_tags: Option<Vec<String>>,
}

impl PluginOptions {
    /// Fill any unset field from `fallback`.
    pub fn or(self, fallback: PluginOptions) -> Self {
        Self {
            header_url: self.header_url.or(fallback.header_url),
            footer_url: self.footer_url.or(fallback.footer_url),
            sidebar_url: self.sidebar_url.or(fallback.sidebar_url),
            ssi_tags: self.ssi_tags.or(fallback.ssi_tags),
        }
    }

    /// Check required fields and produce a [`ReplaceConfig`].
    pub fn validate(self) -> Result<ReplaceConfig> {
        let header_url = require(self.header_url, REQUIRED_URLS[0].0)?;
        let footer_url = require(self.footer_url, REQUIRED_URLS[1].0)?;
        let sidebar_url = require(self.sidebar_url, REQUIRED_URLS[2].0)?;

        if let Some(tags) = &self.ssi_tags {
            if tags.len() != DEFAULT_SSI_TAGS.len() {
                return Err(SsiReplaceError::config(format!(
                    "ssiTags must contain exactly {} markers, got {}",
                    DEFAULT_SSI_TAGS.len(),
                    tags.len()
                )));
            }
            if tags.iter().any(|t| t.is_empty()) {
                return Err(SsiReplaceError::config("ssiTags must not contain empty markers"));
            }
        }

        Ok(ReplaceConfig {
            header_url,
            footer_url,
            sidebar_url,
            ssi_tags: self.ssi_tags,
        })
    }
}

fn require(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SsiReplaceError::config(format!("{name} is required"))),
    }
}

// ---------------------------------------------------------------------------
// Validated config
// ---------------------------------------------------------------------------

/// Validated plugin configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceConfig {
    pub header_url: String,
    pub footer_url: String,
    pub sidebar_url: String,
    pub ssi_tags: Option<Vec<String>>,
}

impl ReplaceConfig {
    /// Fragment URLs in header, footer, sidebar order.
    pub fn urls(&self) -> [&str; 3] {
        [&self.header_url, &self.footer_url, &self.sidebar_url]
    }

    /// Active markers: the custom list if configured, otherwise the defaults.
    pub fn tags(&self) -> Vec<&str> {
        match &self.ssi_tags {
            Some(tags) => tags.iter().map(String::as_str).collect(),
            None => DEFAULT_SSI_TAGS.to_vec(),
        }
    }

    /// Pair markers with URLs for one substitution pass.
    pub fn substitution_spec(&self) -> SubstitutionSpec {
        SubstitutionSpec::pair(self.tags(), self.urls())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.ssi-replace/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SsiReplaceError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Find the config file: `./ssi-replace.toml` first, then the user config dir.
pub fn find_config() -> Result<Option<PathBuf>> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    let user = config_dir()?.join(CONFIG_FILE_NAME);
    Ok(user.exists().then_some(user))
}

/// Load the application config. Returns defaults if no file exists.
pub fn load_config() -> Result<AppConfig> {
    match find_config()? {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!("config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SsiReplaceError::io(path, e))?;
    parse_config(&content)
        .map_err(|e| SsiReplaceError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Parse config TOML, reporting URL options of the wrong type by name.
pub fn parse_config(content: &str) -> std::result::Result<AppConfig, String> {
    let table: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;

    if let Some(plugin) = table.get("plugin").and_then(toml::Value::as_table) {
        for (camel, snake) in REQUIRED_URLS {
            let value = plugin.get(snake).or_else(|| plugin.get(camel));
            if let Some(v) = value {
                if !v.is_str() {
                    return Err(format!("{camel} must be a string"));
                }
            }
        }
    }

    toml::Value::Table(table)
        .try_into::<AppConfig>()
        .map_err(|e| e.to_string())
}

/// Write a template config file into `dir`. Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    init_config_at(&dir.join(CONFIG_FILE_NAME))
}

/// Write a template config file at exactly `path`. Existing files are never
/// read or overwritten.
pub fn init_config_at(path: &Path) -> Result<PathBuf> {
    let path = path.to_path_buf();
    if path.exists() {
        return Err(SsiReplaceError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    std::fs::write(&path, CONFIG_TEMPLATE).map_err(|e| SsiReplaceError::io(&path, e))?;
    tracing::info!(?path, "created config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_options() -> PluginOptions {
        PluginOptions {
            header_url: Some("https://cdn.example.com/header.html".into()),
            footer_url: Some("https://cdn.example.com/footer.html".into()),
            sidebar_url: Some("https://cdn.example.com/sidebar.html".into()),
            ssi_tags: None,
        }
    }

    #[test]
    fn validate_accepts_complete_options() {
        let config = full_options().validate().expect("valid");
        assert_eq!(config.urls()[2], "https://cdn.example.com/sidebar.html");
        assert_eq!(config.tags(), DEFAULT_SSI_TAGS.to_vec());
    }

    #[test]
    fn validate_rejects_missing_sidebar_url() {
        let options = PluginOptions {
            sidebar_url: None,
            ..full_options()
        };
        let err = options.validate().unwrap_err();
        assert!(matches!(err, SsiReplaceError::Config { .. }));
        assert_eq!(err.to_string(), "SsiReplacePlugin: sidebarUrl is required");
    }

    #[test]
    fn validate_rejects_empty_header_url() {
        let options = PluginOptions {
            header_url: Some(String::new()),
            ..full_options()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("headerUrl is required"));
    }

    #[test]
    fn validate_rejects_wrong_tag_count() {
        let options = PluginOptions {
            ssi_tags: Some(vec!["<!-- a -->".into()]),
            ..full_options()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("exactly 3 markers"));
    }

    #[test]
    fn custom_tags_pair_with_urls() {
        let options = PluginOptions {
            ssi_tags: Some(vec!["[H]".into(), "[F]".into(), "[S]".into()]),
            ..full_options()
        };
        let spec = options.validate().unwrap().substitution_spec();
        assert_eq!(spec.entries()[0].marker, "[H]");
        assert_eq!(spec.entries()[0].source_url, "https://cdn.example.com/header.html");
        assert_eq!(spec.entries()[2].marker, "[S]");
    }

    #[test]
    fn options_or_prefers_self() {
        let cli = PluginOptions {
            header_url: Some("https://override/header".into()),
            ..Default::default()
        };
        let merged = cli.or(full_options());
        assert_eq!(merged.header_url.as_deref(), Some("https://override/header"));
        assert_eq!(
            merged.footer_url.as_deref(),
            Some("https://cdn.example.com/footer.html")
        );
    }

    #[test]
    fn parse_template_config() {
        let config = parse_config(CONFIG_TEMPLATE).expect("parse");
        assert_eq!(config.build.mode, BuildMode::Development);
        assert_eq!(config.build.dist_dir, "dist");
        assert!(config.plugin.validate().is_ok());
    }

    #[test]
    fn parse_accepts_camel_case_keys() {
        let toml_str = r#"
[plugin]
headerUrl = "https://a/h"
footerUrl = "https://a/f"
sidebarUrl = "https://a/s"
ssiTags = ["1", "2", "3"]
"#;
        let config = parse_config(toml_str).expect("parse");
        assert_eq!(config.build.mode, BuildMode::Production);
        assert_eq!(config.plugin.sidebar_url.as_deref(), Some("https://a/s"));
        assert_eq!(config.plugin.ssi_tags.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn parse_rejects_non_string_url() {
        let toml_str = r#"
[plugin]
header_url = "https://a/h"
footer_url = 42
sidebar_url = "https://a/s"
"#;
        let err = parse_config(toml_str).unwrap_err();
        assert_eq!(err, "footerUrl must be a string");
    }

    #[test]
    fn init_config_writes_template_once() {
        let dir = std::env::temp_dir().join(format!("ssi-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let path = init_config(&dir).expect("init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.build.mode, BuildMode::Development);

        assert!(init_config(&dir).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn init_config_at_refuses_existing_malformed_file() {
        let dir = std::env::temp_dir().join(format!("ssi-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.toml");
        std::fs::write(&path, "[plugin\nheader_url = ").unwrap();

        let err = init_config_at(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[plugin\nheader_url = ");

        let fresh = dir.join("fresh.toml");
        assert_eq!(init_config_at(&fresh).unwrap(), fresh);
        assert!(load_config_from(&fresh).is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
