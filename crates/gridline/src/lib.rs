//! gridline - a headless data grid core.
//!
//! The grid holds row data and declarative column definitions and produces
//! the rows of the current page through the pipeline
//! **filter -> sort -> paginate**. It renders nothing itself; instead it
//! answers every question a renderer asks: cell values, formatted values,
//! renderer output, CSS classes, sort indicators, column widths and pinned
//! offsets, page state.
//!
//! # Example
//!
//! ```
//! use gridline::{ColumnDef, ColumnFilter, FilterOperator, Grid, GridOptions};
//! use serde_json::json;
//!
//! let grid = Grid::new(GridOptions::default());
//! grid.set_column_defs(vec![ColumnDef::field("name"), ColumnDef::field("city")]);
//! grid.set_row_data(vec![
//!     json!({"id": 1, "name": "Ann", "city": "Oslo"}),
//!     json!({"id": 2, "name": "Bo", "city": "Rome"}),
//! ]);
//!
//! grid.set_column_filter(ColumnFilter::new("city", FilterOperator::Equals, "rome"));
//! assert_eq!(grid.visible_rows().len(), 1);
//! assert_eq!(grid.page_state().total, 1);
//! ```
//!
//! # Server pagination
//!
//! In [`PaginationMode::Server`] the grid asks a [`ServerFetcher`] for each
//! page. A new request cancels the one in flight and only the latest
//! response is applied.

pub mod cell;
pub mod column;
pub mod data;
pub mod error;
pub mod events;
pub mod fetch;
pub mod filter;
pub mod grid;
pub mod layout;
pub mod options;
pub mod pagination;
pub mod selection;
pub mod sort;
pub mod value;

pub use gridline_core::{
    logging, CancellationToken, ConnectionId, CoreError, Property, Signal, Subscription, TaskHandle,
    TaskSpawner,
};

pub use cell::{CellRendererParams, ValueGetterParams};
pub use column::{
    resolve_columns, Align, CellClass, ColumnDef, ColumnFilterOptions, EffectiveFilterOptions,
    FilterConfig,
};
pub use error::{FetchError, GridError, Result};
pub use events::{ClickEvent, EventStream, GridEvent, RowClick, SelectionChange, SortChange};
pub use fetch::{PageRequest, PageResult, ServerFetcher, SharedFetcher};
pub use filter::{ColumnFilter, ColumnFiltersInput, FilterEngine, FilterModel, FilterOperator};
pub use grid::{Grid, RefreshOptions};
pub use layout::{ColumnLayout, PinnedSide};
pub use options::{EventCallback, GridConfig, GridOptions};
pub use pagination::{PageChange, PageState, PaginationEngine, PaginationMode, DEFAULT_PAGE_SIZE};
pub use selection::{RowIdentity, RowSelection, SelectionTracker};
pub use sort::{SortDirection, SortEngine, SortModelItem};
pub use value::{CellValue, RowData, RowId};
