//! Logging facilities for gridline.
//!
//! gridline uses the `tracing` crate for instrumentation. To see logs, install
//! a subscriber in the embedding application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("gridline=debug")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "gridline_core::signal";
    /// Background task target.
    pub const RUNTIME: &str = "gridline_core::runtime";
    /// Grid orchestrator target.
    pub const GRID: &str = "gridline::grid";
    /// Sort engine target.
    pub const SORT: &str = "gridline::sort";
    /// Filter engine target.
    pub const FILTER: &str = "gridline::filter";
    /// Pagination engine target.
    pub const PAGINATION: &str = "gridline::pagination";
    /// Server fetch target.
    pub const FETCH: &str = "gridline::fetch";
    /// Selection tracker target.
    pub const SELECTION: &str = "gridline::selection";
    /// Row data source target.
    pub const DATA: &str = "gridline::data";
}
