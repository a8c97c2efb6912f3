//! Grid configuration.
//!
//! [`GridConfig`] holds the plain, serializable settings and can be loaded
//! from JSON or TOML. [`GridOptions`] adds the closures that cannot be
//! serialized: row identity, global filter predicate, default column and the
//! event callbacks.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDef, ColumnFilterOptions};
use crate::error::{GridError, Result};
use crate::events::{ClickEvent, GridEvent, RowClick, SelectionChange, SortChange};
use crate::filter::{FilterModel, GlobalFilterPredicate};
use crate::pagination::{PageChange, DEFAULT_PAGE_SIZE};
use crate::selection::{RowIdFn, RowSelection};
use crate::value::RowId;

/// Page sizes offered to the user unless configured otherwise.
pub const DEFAULT_PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];

/// Serializable grid settings.
///
/// ```
/// use gridline::GridConfig;
///
/// let config = GridConfig::from_toml_str(r#"
///     rowSelection = "multiple"
///     paginationPageSize = 50
/// "#).unwrap();
/// assert_eq!(config.pagination_page_size, 50);
/// assert!(config.enable_column_filter);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    /// Selection mode, used when the grid has no explicit selection input.
    pub row_selection: Option<RowSelection>,
    /// Treat every header click as a single-column sort.
    pub suppress_multi_sort: bool,
    pub pagination_page_size: usize,
    pub pagination_page_size_options: Vec<usize>,
    /// Master switch for per-column filters.
    pub enable_column_filter: bool,
    /// Filter options applied to every column that does not set its own.
    pub column_filter_defaults: Option<ColumnFilterOptions>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            row_selection: None,
            suppress_multi_sort: false,
            pagination_page_size: DEFAULT_PAGE_SIZE,
            pagination_page_size_options: DEFAULT_PAGE_SIZE_OPTIONS.to_vec(),
            enable_column_filter: true,
            column_filter_defaults: None,
        }
    }
}

impl GridConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a config file, picking the format from the extension
    /// (`.toml`, anything else is read as JSON).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| GridError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Page size with the floor of one applied.
    pub fn page_size(&self) -> usize {
        self.pagination_page_size.max(1)
    }
}

/// Callback invoked with a grid event.
pub type EventCallback<T, E> = Arc<dyn Fn(&GridEvent<T, E>) + Send + Sync>;

/// Full grid options: settings plus closures.
pub struct GridOptions<T> {
    pub config: GridConfig,
    /// Merged under every column definition.
    pub default_col_def: Option<ColumnDef<T>>,
    pub get_row_id: Option<RowIdFn<T>>,
    /// Replaces the built-in all-columns search of the global filter.
    pub global_filter_predicate: Option<GlobalFilterPredicate<T>>,
    pub on_page_changes: Option<EventCallback<T, PageChange>>,
    pub on_sort_changes: Option<EventCallback<T, SortChange>>,
    pub on_selection_changes: Option<EventCallback<T, SelectionChange<T>>>,
    pub on_filter_changes: Option<EventCallback<T, FilterModel>>,
    pub on_row_clicked: Option<EventCallback<T, RowClick<T>>>,
}

impl<T> Default for GridOptions<T> {
    fn default() -> Self {
        Self {
            config: GridConfig::default(),
            default_col_def: None,
            get_row_id: None,
            global_filter_predicate: None,
            on_page_changes: None,
            on_sort_changes: None,
            on_selection_changes: None,
            on_filter_changes: None,
            on_row_clicked: None,
        }
    }
}

impl<T> Clone for GridOptions<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            default_col_def: self.default_col_def.clone(),
            get_row_id: self.get_row_id.clone(),
            global_filter_predicate: self.global_filter_predicate.clone(),
            on_page_changes: self.on_page_changes.clone(),
            on_sort_changes: self.on_sort_changes.clone(),
            on_selection_changes: self.on_selection_changes.clone(),
            on_filter_changes: self.on_filter_changes.clone(),
            on_row_clicked: self.on_row_clicked.clone(),
        }
    }
}

impl<T> fmt::Debug for GridOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridOptions")
            .field("config", &self.config)
            .field("default_col_def", &self.default_col_def)
            .field("get_row_id", &self.get_row_id.is_some())
            .field("global_filter_predicate", &self.global_filter_predicate.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> GridOptions<T> {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_default_col_def(mut self, col: ColumnDef<T>) -> Self {
        self.default_col_def = Some(col);
        self
    }

    pub fn with_row_id<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, usize) -> Option<RowId> + Send + Sync + 'static,
    {
        self.get_row_id = Some(Arc::new(f));
        self
    }

    pub fn with_global_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &str) -> bool + Send + Sync + 'static,
    {
        self.global_filter_predicate = Some(Arc::new(f));
        self
    }

    pub fn on_page_changes<F>(mut self, f: F) -> Self
    where
        F: Fn(&GridEvent<T, PageChange>) + Send + Sync + 'static,
    {
        self.on_page_changes = Some(Arc::new(f));
        self
    }

    pub fn on_sort_changes<F>(mut self, f: F) -> Self
    where
        F: Fn(&GridEvent<T, SortChange>) + Send + Sync + 'static,
    {
        self.on_sort_changes = Some(Arc::new(f));
        self
    }

    pub fn on_selection_changes<F>(mut self, f: F) -> Self
    where
        F: Fn(&GridEvent<T, SelectionChange<T>>) + Send + Sync + 'static,
    {
        self.on_selection_changes = Some(Arc::new(f));
        self
    }

    pub fn on_filter_changes<F>(mut self, f: F) -> Self
    where
        F: Fn(&GridEvent<T, FilterModel>) + Send + Sync + 'static,
    {
        self.on_filter_changes = Some(Arc::new(f));
        self
    }

    pub fn on_row_clicked<F>(mut self, f: F) -> Self
    where
        F: Fn(&GridEvent<T, RowClick<T>>) + Send + Sync + 'static,
    {
        self.on_row_clicked = Some(Arc::new(f));
        self
    }
}

/// Whether a header click asks for multi-column sorting: Shift held and
/// multi-sort not suppressed.
pub(crate) fn wants_multi_sort(config: &GridConfig, event: Option<&ClickEvent>) -> bool {
    !config.suppress_multi_sort && event.is_some_and(|e| e.shift_key)
}
