//! Error types for SSI Replace.
//!
//! Library crates use [`SsiReplaceError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Name used to prefix every user-facing error and warning.
pub const PLUGIN_NAME: &str = "SsiReplacePlugin";

/// Top-level error type for all SSI Replace operations.
#[derive(Debug, thiserror::Error)]
pub enum SsiReplaceError {
    /// Missing or invalid plugin option. Raised before any build runs.
    #[error("{message}")]
    Config { message: String },

    /// The target document is absent from the asset set.
    #[error("{}: {name} not found in assets", PLUGIN_NAME)]
    ArtifactNotFound { name: String },

    /// HTTP client setup error.
    #[error("network error: {0}")]
    Network(String),

    /// Any other failure while processing assets, already prefixed.
    #[error("{0}")]
    Processing(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SsiReplaceError>;

impl SsiReplaceError {
    /// Create a config error, prefixed with the plugin name.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config {
            message: format!("{PLUGIN_NAME}: {msg}"),
        }
    }

    /// Wrap an unexpected failure with the plugin prefix.
    ///
    /// Already-prefixed messages are left as-is so nested wrapping stays readable.
    pub fn processing(msg: impl std::fmt::Display) -> Self {
        let msg = msg.to_string();
        if msg.starts_with(PLUGIN_NAME) {
            Self::Processing(msg)
        } else {
            Self::Processing(format!("{PLUGIN_NAME}: {msg}"))
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
