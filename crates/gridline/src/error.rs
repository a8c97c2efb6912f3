//! Error types for gridline.

use std::path::PathBuf;

use gridline_core::CoreError;

/// Result type for fallible grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Why a server page fetch produced no rows.
///
/// Cloneable so the last failure can be kept in the page state for callers
/// to inspect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The fetcher reported a failure.
    #[error("server fetch failed: {0}")]
    Server(String),
    /// No async runtime was available to drive the fetch.
    #[error("no tokio runtime is available to run the server fetch")]
    NoRuntime,
}

impl FetchError {
    /// Convenience constructor for fetcher implementations.
    pub fn server(message: impl Into<String>) -> Self {
        FetchError::Server(message.into())
    }
}

impl From<CoreError> for FetchError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoRuntime => FetchError::NoRuntime,
        }
    }
}

/// Errors surfaced by grid configuration and setup.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// A config file could not be read.
    #[error("failed to read grid config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A JSON grid config could not be parsed.
    #[error("invalid JSON grid config: {0}")]
    Json(#[from] serde_json::Error),
    /// A TOML grid config could not be parsed.
    #[error("invalid TOML grid config: {0}")]
    Toml(#[from] toml::de::Error),
    /// Background work could not be started.
    #[error(transparent)]
    Core(#[from] CoreError),
}
