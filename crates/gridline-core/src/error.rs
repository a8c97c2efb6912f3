//! Error types for gridline-core.

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the reactive core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Background work was requested outside of a Tokio runtime.
    #[error("no tokio runtime is available to run background tasks")]
    NoRuntime,
}
