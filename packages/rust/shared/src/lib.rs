//! Shared types, error model, and configuration for SSI Replace.
//!
//! This crate is the foundation depended on by all other SSI Replace crates.
//! It provides:
//! - [`SsiReplaceError`]: the unified error type
//! - Domain types ([`SubstitutionSpec`], [`FetchOutcome`], [`BuildMode`])
//! - Configuration ([`AppConfig`], [`PluginOptions`], [`ReplaceConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, PluginOptions, ReplaceConfig, config_dir, find_config, init_config,
    init_config_at, load_config, load_config_from, parse_config,
};
pub use error::{PLUGIN_NAME, Result, SsiReplaceError};
pub use types::{
    BuildMode, DEFAULT_SSI_TAGS, FETCH_TIMEOUT, FetchOutcome, INDEX_HTML, SubstitutionEntry,
    SubstitutionSpec,
};
