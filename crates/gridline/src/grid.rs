//! The grid orchestrator.
//!
//! [`Grid`] owns every engine and keeps the pipeline
//! `data -> filter -> sort -> paginate` consistent as inputs change. Each
//! input lives in a versioned [`Property`]; the filtered/sorted rows and the
//! visible page are recomputed lazily and memoized on those versions.
//!
//! Events are emitted synchronously after the state they describe has been
//! updated, and never while an internal lock is held, so slots and callbacks
//! may call back into the grid.
//!
//! # Example
//!
//! ```
//! use gridline::{ColumnDef, Grid, GridOptions};
//! use serde_json::{json, Value};
//!
//! let grid: Grid<Value> = Grid::new(GridOptions::default());
//! grid.set_column_defs(vec![ColumnDef::field("name"), ColumnDef::field("age")]);
//! grid.set_row_data(vec![
//!     json!({"id": 1, "name": "Alice", "age": 30}),
//!     json!({"id": 2, "name": "bob", "age": 25}),
//! ]);
//!
//! grid.header_click("age", None);
//! let names: Vec<Value> = grid.visible_rows().iter().map(|row| row["name"].clone()).collect();
//! assert_eq!(names, vec![json!("bob"), json!("Alice")]);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use tracing::Instrument;

use gridline_core::logging::targets;
use gridline_core::{Property, Signal, TaskSpawner};

use crate::cell;
use crate::column::{
    effective_filter_options, find_column, is_column_filter_enabled, resolve_columns, ColumnDef,
    EffectiveFilterOptions,
};
use crate::data::DataSource;
use crate::error::{FetchError, Result};
use crate::events::{ClickEvent, EventStream, GridEvent, RowClick, SelectionChange, SortChange};
use crate::fetch::{PageResult, ServerFetcher, SharedFetcher};
use crate::filter::{ColumnFilter, ColumnFiltersInput, FilterEngine, FilterModel};
use crate::layout::{ColumnLayout, PinnedSide};
use crate::options::{wants_multi_sort, EventCallback, GridOptions};
use crate::pagination::{FetchOutcome, PageChange, PageState, PaginationEngine, PaginationMode};
use crate::selection::{RowIdentity, RowSelection, SelectionTracker};
use crate::sort::{sort_rows, SortDirection, SortEngine, SortModelItem};
use crate::value::{CellValue, RowData, RowId};

/// Options for [`Grid::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Stay on the current page instead of returning to the first one.
    pub keep_page: bool,
}

/// A headless data grid.
///
/// `Grid` is a cheap handle; clones share the same state.
pub struct Grid<T> {
    inner: Arc<GridInner<T>>,
}

impl<T> Clone for Grid<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct GridInner<T> {
    data: Property<DataSource<T>>,
    raw_columns: Property<Vec<ColumnDef<T>>>,
    default_col_def: Property<Option<ColumnDef<T>>>,
    columns: Property<Vec<ColumnDef<T>>>,
    options: Property<GridOptions<T>>,
    row_selection: Property<Option<RowSelection>>,
    sort: Property<SortEngine>,
    filter: Property<FilterEngine>,
    pagination: Property<PaginationEngine<T>>,
    selection: Property<SelectionTracker>,
    layout: Property<ColumnLayout>,
    fetcher: Property<Option<SharedFetcher<T>>>,
    request_meta: Property<Option<serde_json::Value>>,
    spawner: TaskSpawner,
    destroyed: AtomicBool,
    cache: Mutex<PipelineCache<T>>,
    last_page: Mutex<PageChange>,
    signals: GridSignals<T>,
}

struct GridSignals<T> {
    page: Arc<Signal<GridEvent<T, PageChange>>>,
    sort: Arc<Signal<GridEvent<T, SortChange>>>,
    selection: Arc<Signal<GridEvent<T, SelectionChange<T>>>>,
    filter: Arc<Signal<GridEvent<T, FilterModel>>>,
    row_click: Arc<Signal<GridEvent<T, RowClick<T>>>>,
}

/// Input versions the filtered and sorted rows depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowsKey {
    data: u64,
    columns: u64,
    sort: u64,
    filter: u64,
    options: u64,
    /// Only tracked while a custom comparator can observe selection.
    selection: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VisibleKey {
    rows: Option<RowsKey>,
    pagination: u64,
}

struct PipelineCache<T> {
    rows: Option<(RowsKey, Arc<Vec<T>>)>,
    visible: Option<(VisibleKey, Arc<Vec<T>>)>,
}

impl<T> Default for PipelineCache<T> {
    fn default() -> Self {
        Self {
            rows: None,
            visible: None,
        }
    }
}

impl<T> Grid<T>
where
    T: RowData + Clone + Send + Sync + 'static,
{
    /// Creates a grid running background work on the current Tokio runtime,
    /// if any.
    pub fn new(options: GridOptions<T>) -> Self {
        Self::with_spawner(options, TaskSpawner::current())
    }

    /// Creates a grid running background work through `spawner`.
    pub fn with_spawner(options: GridOptions<T>, spawner: TaskSpawner) -> Self {
        let page_size = options.config.page_size();
        let mode = options.config.row_selection.unwrap_or_default();
        let pagination = PaginationEngine::new(page_size);
        let last_page = pagination.page_state().change();

        let inner = GridInner {
            data: Property::new(DataSource::default()),
            raw_columns: Property::new(Vec::new()),
            default_col_def: Property::new(None),
            columns: Property::new(Vec::new()),
            options: Property::new(options),
            row_selection: Property::new(None),
            sort: Property::new(SortEngine::new()),
            filter: Property::new(FilterEngine::new()),
            pagination: Property::new(pagination),
            selection: Property::new(SelectionTracker::new(mode)),
            layout: Property::new(ColumnLayout::new()),
            fetcher: Property::new(None),
            request_meta: Property::new(None),
            spawner,
            destroyed: AtomicBool::new(false),
            cache: Mutex::new(PipelineCache::default()),
            last_page: Mutex::new(last_page),
            signals: GridSignals {
                page: Arc::new(Signal::new()),
                sort: Arc::new(Signal::new()),
                selection: Arc::new(Signal::new()),
                filter: Arc::new(Signal::new()),
                row_click: Arc::new(Signal::new()),
            },
        };
        tracing::debug!(target: targets::GRID, page_size, ?mode, "grid created");
        Self { inner: Arc::new(inner) }
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Replaces the static rows. Ignored for display while a row stream is bound.
    pub fn set_row_data(&self, rows: Vec<T>) {
        tracing::debug!(target: targets::DATA, rows = rows.len(), "row data set");
        if self.inner.data.modify(|data| data.set_static_rows(rows)) {
            self.after_data_change();
        }
    }

    /// Binds a stream of row collections; each emission replaces the rows.
    ///
    /// Until the first emission the grid shows no rows. Binding a new stream
    /// or calling [`clear_row_stream`](Self::clear_row_stream) stops the
    /// previous one.
    pub fn set_row_stream<S>(&self, stream: S) -> Result<()>
    where
        S: Stream<Item = Vec<T>> + Send + 'static,
    {
        if self.is_destroyed() {
            return Ok(());
        }
        let generation = self.inner.data.update(|data| data.begin_stream());
        self.after_data_change();

        let weak = Arc::downgrade(&self.inner);
        let forward = async move {
            let mut stream = std::pin::pin!(stream);
            while let Some(rows) = stream.next().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Grid { inner }.apply_stream_rows(generation, rows);
            }
        };

        match self.inner.spawner.spawn_cancellable(forward) {
            Ok(task) => {
                self.inner.data.modify(|data| {
                    data.attach_task(generation, task);
                    false
                });
                Ok(())
            }
            Err(err) => {
                self.inner.data.update(|data| data.end_stream());
                self.after_data_change();
                Err(err.into())
            }
        }
    }

    /// Unbinds the row stream and falls back to the static rows.
    pub fn clear_row_stream(&self) {
        if self.inner.data.modify(|data| data.end_stream()) {
            self.after_data_change();
        }
    }

    fn apply_stream_rows(&self, generation: u64, rows: Vec<T>) {
        if self.is_destroyed() {
            return;
        }
        if self.inner.data.modify(|data| data.push_stream_rows(generation, rows)) {
            self.after_data_change();
        }
    }

    pub fn set_column_defs(&self, defs: Vec<ColumnDef<T>>) {
        self.inner.raw_columns.replace_with(defs);
        self.rebuild_columns();
    }

    /// Default column definition, used when the options carry none.
    pub fn set_default_col_def(&self, def: Option<ColumnDef<T>>) {
        self.inner.default_col_def.replace_with(def);
        self.rebuild_columns();
    }

    /// Replaces the options.
    ///
    /// A changed configured page size is applied (returning to the first
    /// page); the current page size is otherwise left alone.
    pub fn set_options(&self, options: GridOptions<T>) {
        let (old_size, had_default) = self
            .inner
            .options
            .with(|old| (old.config.page_size(), old.default_col_def.is_some()));
        let new_size = options.config.page_size();
        let rebuild = had_default || options.default_col_def.is_some();

        self.inner.options.replace_with(options);
        self.apply_selection_mode();
        if rebuild {
            self.rebuild_columns();
        }
        if old_size != new_size && self.inner.pagination.modify(|p| p.set_page_size(new_size)) {
            self.refetch_if_server();
        }
        self.settle();
    }

    /// Explicit selection mode. `None` falls back to the configured one.
    ///
    /// Changing the mode keeps the current selection.
    pub fn set_row_selection(&self, mode: Option<RowSelection>) {
        if self.inner.row_selection.set(mode) {
            self.apply_selection_mode();
        }
    }

    pub fn set_pagination_mode(&self, mode: PaginationMode) {
        if !self.inner.pagination.modify(|p| p.set_mode(mode)) {
            return;
        }
        if mode == PaginationMode::Server {
            self.refetch();
        }
        self.settle();
    }

    /// Sets the fetcher used in server mode and fetches the current page.
    pub fn set_server_fetcher<F>(&self, fetcher: F)
    where
        F: ServerFetcher<T> + 'static,
    {
        self.inner.fetcher.replace_with(Some(Arc::new(fetcher)));
        self.refetch_if_server();
    }

    /// Removes the fetcher, cancelling any in-flight fetch.
    pub fn clear_server_fetcher(&self) {
        self.inner.fetcher.replace_with(None);
        self.inner.pagination.update(|p| p.cancel_in_flight());
    }

    /// Extra data passed along with every page request.
    pub fn set_request_meta(&self, meta: Option<serde_json::Value>) {
        if self.inner.request_meta.set(meta) {
            self.refetch_if_server();
        }
    }

    /// Externally bound global filter text.
    pub fn bind_filter_text(&self, text: Option<&str>) {
        self.set_global_filter(text.unwrap_or_default());
    }

    /// Externally bound column filters, as a list or a record keyed by
    /// column id. `None` clears them.
    pub fn bind_column_filters(&self, filters: Option<ColumnFiltersInput>) {
        let filters = filters.map(ColumnFiltersInput::into_filters).unwrap_or_default();
        if self.inner.filter.modify(|f| f.replace_column_filters(filters)) {
            self.after_filter_change();
        }
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// The rows on the current page.
    pub fn visible_rows(&self) -> Arc<Vec<T>> {
        let server = self.inner.pagination.with(|p| p.is_server());
        let rows = (!server).then(|| self.processed_rows());
        let key = VisibleKey {
            rows: rows.as_ref().map(|(key, _)| *key),
            pagination: self.inner.pagination.version(),
        };

        if let Some((cached, visible)) = &self.inner.cache.lock().visible {
            if *cached == key {
                return Arc::clone(visible);
            }
        }

        let source: &[T] = rows.as_ref().map(|(_, rows)| rows.as_slice()).unwrap_or(&[]);
        let visible = Arc::new(self.inner.pagination.with(|p| p.apply(source)));
        self.inner.cache.lock().visible = Some((key, Arc::clone(&visible)));
        visible
    }

    /// All rows after filtering and sorting, before pagination.
    pub fn filtered_rows(&self) -> Arc<Vec<T>> {
        self.processed_rows().1
    }

    /// The rows currently in effect, before any processing.
    pub fn row_data(&self) -> Vec<T> {
        self.inner.data.with(|data| data.rows().to_vec())
    }

    fn processed_rows(&self) -> (RowsKey, Arc<Vec<T>>) {
        let inner = &self.inner;
        let has_comparator = inner
            .columns
            .with(|cols| cols.iter().any(|col| col.comparator.is_some()));
        let key = RowsKey {
            data: inner.data.version(),
            columns: inner.columns.version(),
            sort: inner.sort.version(),
            filter: inner.filter.version(),
            options: inner.options.version(),
            selection: if has_comparator { inner.selection.version() } else { 0 },
        };

        if let Some((cached, rows)) = &inner.cache.lock().rows {
            if *cached == key {
                return (key, Arc::clone(rows));
            }
        }

        let _span = tracing::trace_span!(target: targets::GRID, "pipeline").entered();
        let columns = inner.columns.get();
        let filter = inner.filter.get();
        let sort_model = inner.sort.with(|s| s.model().to_vec());
        let (predicate, identity) = inner
            .options
            .with(|o| (o.global_filter_predicate.clone(), RowIdentity::new(o.get_row_id.clone())));
        let selection = inner.selection.get();

        let rows = inner.data.with(|data| {
            let filtered = filter.apply(data.rows(), &columns, predicate.as_ref());
            if sort_model.is_empty() {
                return filtered.into_owned();
            }
            sort_rows(&filtered, &sort_model, &columns, &|row: &T, index: usize| {
                let id = identity.id_of(row, index);
                let selected = selection.is_selected(&id);
                (id, selected)
            })
        });
        tracing::trace!(target: targets::GRID, rows = rows.len(), "pipeline recomputed");

        let rows = Arc::new(rows);
        inner.cache.lock().rows = Some((key, Arc::clone(&rows)));
        (key, rows)
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Effective column definitions.
    pub fn columns(&self) -> Vec<ColumnDef<T>> {
        self.inner.columns.get()
    }

    pub fn column(&self, col_id: &str) -> Option<ColumnDef<T>> {
        self.inner.columns.with(|cols| find_column(cols, col_id).cloned())
    }

    fn rebuild_columns(&self) {
        let default = self
            .inner
            .options
            .with(|o| o.default_col_def.clone())
            .or_else(|| self.inner.default_col_def.get());
        let resolved = self
            .inner
            .raw_columns
            .with(|raw| resolve_columns(raw, default.as_ref()));
        tracing::debug!(target: targets::GRID, columns = resolved.len(), "columns resolved");

        self.inner.layout.modify(|layout| layout.reconcile(&resolved));
        let before = self.sort_model();
        self.inner.sort.update(|s| s.seed_from_columns(&resolved));
        self.inner.columns.replace_with(resolved);

        if self.sort_model() != before {
            self.after_sort_change(None);
        } else {
            self.settle();
        }
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    pub fn sort_model(&self) -> Vec<SortModelItem> {
        self.inner.sort.with(|s| s.model().to_vec())
    }

    pub fn set_sort_model(&self, model: Vec<SortModelItem>) {
        self.inner.sort.update(|s| s.set_model(model));
        self.after_sort_change(None);
    }

    pub fn clear_sort(&self) {
        self.inner.sort.update(|s| s.clear());
        self.after_sort_change(None);
    }

    /// Cycles the clicked column's sort. A Shift-click adds to a
    /// multi-column sort unless multi-sort is suppressed; any other click
    /// replaces the model.
    ///
    /// Returns `false` if the column is unknown or not sortable.
    pub fn header_click(&self, col_id: &str, event: Option<ClickEvent>) -> bool {
        let Some(col) = self.column(col_id) else {
            return false;
        };
        let multi = self
            .inner
            .options
            .with(|o| wants_multi_sort(&o.config, event.as_ref()));
        if !self.inner.sort.modify(|s| s.on_header_click(&col, multi)) {
            return false;
        }
        self.after_sort_change(event);
        true
    }

    pub fn sort_for(&self, col_id: &str) -> Option<SortDirection> {
        self.inner.sort.with(|s| s.sort_for(col_id))
    }

    /// Sort priority for header badges; only set while several columns sort.
    pub fn sort_index_for(&self, col_id: &str) -> Option<usize> {
        self.inner.sort.with(|s| s.sort_index_for(col_id))
    }

    fn after_sort_change(&self, original: Option<ClickEvent>) {
        let callback = self.inner.options.with(|o| o.on_sort_changes.clone());
        let change = SortChange {
            sort_model: self.sort_model(),
        };
        self.emit(&self.inner.signals.sort, callback, change, original);
        self.refetch_if_server();
        self.settle();
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    pub fn global_filter(&self) -> String {
        self.inner.filter.with(|f| f.global_text().to_string())
    }

    pub fn set_global_filter(&self, text: impl Into<String>) {
        let text = text.into();
        if self.inner.filter.modify(|f| f.set_global_text(text)) {
            self.after_filter_change();
        }
    }

    pub fn column_filter(&self, col_id: &str) -> Option<ColumnFilter> {
        self.inner.filter.with(|f| f.column_filter(col_id).cloned())
    }

    pub fn column_filters(&self) -> Vec<ColumnFilter> {
        self.inner.filter.with(|f| f.column_filters().to_vec())
    }

    /// Adds or replaces the filter for `filter.col_id`.
    pub fn set_column_filter(&self, filter: ColumnFilter) {
        if self.inner.filter.modify(|f| f.set_column_filter(filter)) {
            self.after_filter_change();
        }
    }

    pub fn clear_column_filter(&self, col_id: &str) {
        if self.inner.filter.modify(|f| f.clear_column_filter(col_id)) {
            self.after_filter_change();
        }
    }

    pub fn clear_all_filters(&self) {
        if self.inner.filter.modify(|f| f.clear_all()) {
            self.after_filter_change();
        }
    }

    pub fn filter_model(&self) -> FilterModel {
        self.inner.filter.with(|f| f.model())
    }

    fn after_filter_change(&self) {
        let callback = self.inner.options.with(|o| o.on_filter_changes.clone());
        let model = self.filter_model();
        self.emit(&self.inner.signals.filter, callback, model, None);
        self.settle();
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Selected rows, in data order.
    pub fn selected_rows(&self) -> Vec<T> {
        let identity = self.identity();
        self.inner
            .selection
            .with(|s| self.inner.data.with(|data| s.selected_rows(data.rows(), &identity)))
    }

    pub fn selected_ids(&self) -> Vec<RowId> {
        self.inner.selection.with(|s| s.selected_ids())
    }

    pub fn is_selected(&self, row: &T, row_index: usize) -> bool {
        let id = self.track_row(row, row_index);
        self.inner.selection.with(|s| s.is_selected(&id))
    }

    pub fn clear_selection(&self) {
        self.inner.selection.update(|s| s.clear());
        self.emit_selection(None);
    }

    pub fn row_selection(&self) -> RowSelection {
        self.inner.selection.with(|s| s.mode())
    }

    /// Handles a click on a row: emits the row click, then applies it to
    /// the selection.
    pub fn row_click(&self, row: &T, row_index: usize, event: Option<ClickEvent>) {
        let callback = self.inner.options.with(|o| o.on_row_clicked.clone());
        let click = RowClick {
            data: row.clone(),
            row_index,
        };
        self.emit(&self.inner.signals.row_click, callback, click, event);

        let id = self.track_row(row, row_index);
        if self.inner.selection.modify(|s| s.on_row_click(id)) {
            tracing::debug!(target: targets::SELECTION, row_index, "row selection changed");
            self.emit_selection(event);
        }
    }

    /// Clicks the row at `position` on the current page. Returns `false` if
    /// there is no such row.
    pub fn click_visible_row(&self, position: usize, event: Option<ClickEvent>) -> bool {
        let visible = self.visible_rows();
        match visible.get(position) {
            Some(row) => {
                self.row_click(row, position, event);
                true
            }
            None => false,
        }
    }

    /// Stable identity of a row, as used for selection.
    pub fn track_row(&self, row: &T, row_index: usize) -> RowId {
        self.identity().id_of(row, row_index)
    }

    fn identity(&self) -> RowIdentity<T> {
        self.inner
            .options
            .with(|o| RowIdentity::new(o.get_row_id.clone()))
    }

    fn apply_selection_mode(&self) {
        let explicit = self.inner.row_selection.get();
        let configured = self.inner.options.with(|o| o.config.row_selection);
        let mode = explicit.or(configured).unwrap_or_default();
        let changed = self.inner.selection.modify(|s| {
            if s.mode() == mode {
                return false;
            }
            s.set_mode(mode);
            true
        });
        if changed {
            tracing::debug!(target: targets::SELECTION, ?mode, "selection mode changed");
        }
    }

    fn emit_selection(&self, original: Option<ClickEvent>) {
        let callback = self.inner.options.with(|o| o.on_selection_changes.clone());
        let change = SelectionChange {
            selected: self.selected_rows(),
        };
        self.emit(&self.inner.signals.selection, callback, change, original);
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    pub fn pagination_mode(&self) -> PaginationMode {
        self.inner.pagination.with(|p| p.mode())
    }

    pub fn page_index(&self) -> usize {
        self.inner.pagination.with(|p| p.page_index())
    }

    pub fn page_size(&self) -> usize {
        self.inner.pagination.with(|p| p.page_size())
    }

    pub fn total(&self) -> usize {
        self.settle_quietly();
        self.inner.pagination.with(|p| p.total())
    }

    pub fn page_count(&self) -> usize {
        self.settle_quietly();
        self.inner.pagination.with(|p| p.page_count())
    }

    /// Page sizes offered to the user.
    pub fn page_size_options(&self) -> Vec<usize> {
        self.inner
            .options
            .with(|o| o.config.pagination_page_size_options.clone())
    }

    /// Moves to a page, clamped into range.
    pub fn set_page_index(&self, index: usize) {
        let changed = self.inner.pagination.modify(|p| p.set_page_index(index));
        self.after_page_move(changed);
    }

    /// Sets the page size (at least 1) and returns to the first page.
    pub fn set_page_size(&self, size: usize) {
        let changed = self.inner.pagination.modify(|p| p.set_page_size(size));
        self.after_page_move(changed);
    }

    pub fn next_page(&self) {
        let changed = self.inner.pagination.modify(|p| p.next());
        self.after_page_move(changed);
    }

    pub fn prev_page(&self) {
        let changed = self.inner.pagination.modify(|p| p.prev());
        self.after_page_move(changed);
    }

    pub fn first_page(&self) {
        let changed = self.inner.pagination.modify(|p| p.first());
        self.after_page_move(changed);
    }

    pub fn last_page(&self) {
        let changed = self.inner.pagination.modify(|p| p.last());
        self.after_page_move(changed);
    }

    /// Re-runs the pipeline, or re-fetches the page in server mode.
    pub fn refresh(&self, options: RefreshOptions) {
        tracing::debug!(target: targets::GRID, keep_page = options.keep_page, "refresh");
        if !options.keep_page {
            self.inner.pagination.modify(|p| p.first());
        }
        if self.inner.pagination.with(|p| p.is_server()) {
            self.refetch();
        } else {
            self.inner.data.touch();
        }
        self.settle();
    }

    /// Snapshot of the pagination state, including loading and error.
    pub fn page_state(&self) -> PageState {
        self.settle_quietly();
        self.inner.pagination.with(|p| p.page_state())
    }

    fn after_page_move(&self, changed: bool) {
        if changed {
            self.refetch_if_server();
        }
        self.settle();
    }

    fn refetch_if_server(&self) {
        if self.inner.pagination.with(|p| p.is_server()) {
            self.refetch();
        }
    }

    /// Starts a fetch of the current page, superseding any in-flight one.
    fn refetch(&self) {
        if self.is_destroyed() {
            return;
        }
        let Some(fetcher) = self.inner.fetcher.get() else {
            tracing::trace!(target: targets::FETCH, "server mode without fetcher");
            return;
        };

        let sort_model = self.sort_model();
        let filter_model = self
            .inner
            .filter
            .with(|f| f.is_active().then(|| f.model()));
        let meta = self.inner.request_meta.get();
        let ticket = self
            .inner
            .pagination
            .update(|p| p.begin_fetch(sort_model, filter_model, meta));
        let seq = ticket.seq;

        let span = tracing::debug_span!(
            target: targets::FETCH,
            "fetch",
            seq,
            page_index = ticket.request.page_index,
            page_size = ticket.request.page_size
        );
        let request = fetcher.fetch(ticket.request);
        let weak = Arc::downgrade(&self.inner);
        let task = async move {
            let result = request.await;
            if let Some(inner) = weak.upgrade() {
                Grid { inner }.finish_fetch(seq, result);
            }
        }
        .instrument(span);

        if let Err(err) = self.inner.spawner.spawn_with_token(ticket.token, task) {
            tracing::warn!(target: targets::FETCH, seq, "server fetch could not be started");
            self.finish_fetch(seq, Err(FetchError::from(err)));
        }
    }

    fn finish_fetch(&self, seq: u64, result: std::result::Result<PageResult<T>, FetchError>) {
        if self.is_destroyed() {
            return;
        }
        if let Ok(page) = &result {
            tracing::debug!(target: targets::FETCH, seq, rows = page.rows.len(), total = page.total, "fetch completed");
        }
        match self.inner.pagination.update(|p| p.complete_fetch(seq, result)) {
            FetchOutcome::Stale => {}
            FetchOutcome::Applied { page_clamped } => {
                self.settle();
                if page_clamped {
                    self.refetch();
                }
            }
        }
    }

    // =========================================================================
    // Cells
    // =========================================================================

    pub fn cell_raw_value(&self, row: &T, col_id: &str, row_index: usize) -> CellValue {
        self.column(col_id)
            .map(|col| cell::raw_value(row, &col, row_index))
            .unwrap_or_default()
    }

    pub fn cell_formatted_value(&self, row: &T, col_id: &str, row_index: usize) -> CellValue {
        self.column(col_id)
            .map(|col| cell::formatted_value(row, &col, row_index))
            .unwrap_or_default()
    }

    /// Renderer output, or `None` when the column has no renderer.
    pub fn cell_render_output(&self, row: &T, col_id: &str, row_index: usize) -> Option<CellValue> {
        let col = self.column(col_id)?;
        let selected = self.is_selected(row, row_index);
        cell::render_output(row, &col, row_index, selected)
    }

    pub fn cell_class_list(&self, row: &T, col_id: &str, row_index: usize) -> Vec<String> {
        let Some(col) = self.column(col_id) else {
            return Vec::new();
        };
        let selected = self.is_selected(row, row_index);
        cell::class_list(row, &col, row_index, selected)
    }

    // =========================================================================
    // Column layout
    // =========================================================================

    pub fn column_width(&self, col_id: &str) -> f32 {
        self.inner
            .columns
            .with(|cols| self.inner.layout.with(|layout| layout.column_width(cols, col_id)))
    }

    /// Sets a column width, clamped to the column's bounds.
    pub fn set_column_width(&self, col_id: &str, width: f32) -> bool {
        self.inner
            .columns
            .with(|cols| self.inner.layout.modify(|layout| layout.set_column_width(cols, col_id, width)))
    }

    pub fn pin_column(&self, col_id: &str, side: Option<PinnedSide>) -> bool {
        self.inner
            .columns
            .with(|cols| self.inner.layout.modify(|layout| layout.pin_column(cols, col_id, side)))
    }

    pub fn pinned_side(&self, col_id: &str) -> Option<PinnedSide> {
        self.inner.layout.with(|layout| layout.pinned_side(col_id))
    }

    pub fn pinned_offset(&self, col_id: &str) -> f32 {
        self.inner
            .columns
            .with(|cols| self.inner.layout.with(|layout| layout.pinned_offset(cols, col_id)))
    }

    pub fn is_resizable(&self, col_id: &str) -> bool {
        self.column(col_id).is_some_and(|col| col.is_resizable())
    }

    pub fn is_column_filter_enabled(&self, col_id: &str) -> bool {
        let Some(col) = self.column(col_id) else {
            return false;
        };
        self.inner
            .options
            .with(|o| is_column_filter_enabled(&col, &o.config))
    }

    pub fn effective_filter_options(&self, col_id: &str) -> Option<EffectiveFilterOptions> {
        let col = self.column(col_id)?;
        Some(
            self.inner
                .options
                .with(|o| effective_filter_options(&col, &o.config)),
        )
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn page_changes(&self) -> EventStream<GridEvent<T, PageChange>> {
        EventStream::subscribe(&self.inner.signals.page)
    }

    pub fn sort_changes(&self) -> EventStream<GridEvent<T, SortChange>> {
        EventStream::subscribe(&self.inner.signals.sort)
    }

    pub fn selection_changes(&self) -> EventStream<GridEvent<T, SelectionChange<T>>> {
        EventStream::subscribe(&self.inner.signals.selection)
    }

    pub fn filter_changes(&self) -> EventStream<GridEvent<T, FilterModel>> {
        EventStream::subscribe(&self.inner.signals.filter)
    }

    pub fn row_clicks(&self) -> EventStream<GridEvent<T, RowClick<T>>> {
        EventStream::subscribe(&self.inner.signals.row_click)
    }

    /// Signal emitted when the page position, size or total changes.
    pub fn page_changed(&self) -> &Arc<Signal<GridEvent<T, PageChange>>> {
        &self.inner.signals.page
    }

    pub fn sort_changed(&self) -> &Arc<Signal<GridEvent<T, SortChange>>> {
        &self.inner.signals.sort
    }

    pub fn selection_changed(&self) -> &Arc<Signal<GridEvent<T, SelectionChange<T>>>> {
        &self.inner.signals.selection
    }

    pub fn filter_changed(&self) -> &Arc<Signal<GridEvent<T, FilterModel>>> {
        &self.inner.signals.filter
    }

    pub fn row_clicked(&self) -> &Arc<Signal<GridEvent<T, RowClick<T>>>> {
        &self.inner.signals.row_click
    }

    fn emit<E>(
        &self,
        signal: &Signal<GridEvent<T, E>>,
        callback: Option<EventCallback<T, E>>,
        event: E,
        original_event: Option<ClickEvent>,
    ) where
        E: Clone + Send + 'static,
    {
        let event = GridEvent {
            api: self.clone(),
            event,
            original_event,
        };
        signal.emit(event.clone());
        if let Some(callback) = callback {
            callback(&event);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Cancels pending fetches and the row stream and disconnects every
    /// event listener. The grid stays queryable.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.pagination.update(|p| p.cancel_in_flight());
        self.inner.data.update(|data| data.end_stream());

        let signals = &self.inner.signals;
        signals.page.disconnect_all();
        signals.sort.disconnect_all();
        signals.selection.disconnect_all();
        signals.filter.disconnect_all();
        signals.row_click.disconnect_all();
        tracing::debug!(target: targets::GRID, "grid destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    // =========================================================================
    // Consistency
    // =========================================================================

    fn after_data_change(&self) {
        self.emit_selection(None);
        self.settle();
    }

    /// Brings the client total up to date and clamps the page index.
    fn settle_quietly(&self) {
        if self.inner.pagination.with(|p| p.is_server()) {
            return;
        }
        let total = self.processed_rows().1.len();
        self.inner.pagination.modify(|p| {
            let before = p.total();
            let clamped = p.set_client_total(total);
            clamped || before != p.total()
        });
    }

    /// Like `settle_quietly`, then emits a page event if the page snapshot
    /// moved since the last one.
    fn settle(&self) {
        self.settle_quietly();
        let snapshot = self.inner.pagination.with(|p| p.page_state().change());
        {
            let mut last = self.inner.last_page.lock();
            if *last == snapshot {
                return;
            }
            *last = snapshot;
        }
        tracing::debug!(
            target: targets::PAGINATION,
            page_index = snapshot.page_index,
            page_size = snapshot.page_size,
            total = snapshot.total,
            "page changed"
        );
        let callback = self.inner.options.with(|o| o.on_page_changes.clone());
        self.emit(&self.inner.signals.page, callback, snapshot, None);
    }
}

impl<T> fmt::Debug for Grid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("destroyed", &self.inner.destroyed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Grid<serde_json::Value>: Send, Sync, Clone, fmt::Debug);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    fn people() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Ann", "age": 30}),
            json!({"id": 2, "name": "bob", "age": 25}),
            json!({"id": 3, "name": "Cid", "age": 35}),
        ]
    }

    fn grid() -> Grid<Value> {
        let grid = Grid::with_spawner(GridOptions::default(), TaskSpawner::detached());
        grid.set_column_defs(vec![ColumnDef::field("name"), ColumnDef::field("age")]);
        grid.set_row_data(people());
        grid
    }

    #[test]
    fn test_visible_rows_are_memoized() {
        let grid = grid();
        let first = grid.visible_rows();
        let second = grid.visible_rows();
        assert!(Arc::ptr_eq(&first, &second));

        grid.set_global_filter("ann");
        let filtered = grid.visible_rows();
        assert!(!Arc::ptr_eq(&first, &filtered));
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_selection_mode_resolution() {
        let grid = grid();
        assert_eq!(grid.row_selection(), RowSelection::None);

        let mut options = GridOptions::default();
        options.config.row_selection = Some(RowSelection::Multiple);
        grid.set_options(options);
        assert_eq!(grid.row_selection(), RowSelection::Multiple);

        grid.set_row_selection(Some(RowSelection::Single));
        assert_eq!(grid.row_selection(), RowSelection::Single);
        grid.set_row_selection(None);
        assert_eq!(grid.row_selection(), RowSelection::Multiple);
    }

    #[test]
    fn test_mode_change_keeps_selection() {
        let grid = grid();
        grid.set_row_selection(Some(RowSelection::Multiple));
        let rows = grid.visible_rows();
        grid.row_click(&rows[0], 0, None);
        grid.row_click(&rows[2], 2, None);
        grid.set_row_selection(Some(RowSelection::Single));
        assert_eq!(grid.selected_ids(), vec![RowId::Int(1), RowId::Int(3)]);
    }

    #[test]
    fn test_page_event_only_on_snapshot_change() {
        let grid = grid();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        grid.page_changed().connect(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        grid.set_page_size(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        grid.set_page_size(2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        grid.next_page();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        grid.next_page();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_options_page_size_applies_only_when_changed() {
        let grid = grid();
        grid.set_page_size(2);
        grid.next_page();

        grid.set_options(GridOptions::default());
        assert_eq!(grid.page_size(), 2);
        assert_eq!(grid.page_index(), 1);

        let mut options = GridOptions::default();
        options.config.pagination_page_size = 1;
        grid.set_options(options);
        assert_eq!(grid.page_size(), 1);
        assert_eq!(grid.page_index(), 0);
    }

    #[test]
    fn test_default_col_def_sources() {
        let grid = grid();
        grid.set_default_col_def(Some(ColumnDef::default().with_sortable(false)));
        assert!(!grid.header_click("age", None));

        let options = GridOptions::default().with_default_col_def(ColumnDef::default().with_sortable(true));
        grid.set_options(options);
        assert!(grid.header_click("age", None));
    }

    #[test]
    fn test_server_mode_without_runtime_records_failure() {
        let grid = grid();
        grid.set_server_fetcher(|_request: crate::PageRequest| async {
            Ok::<_, FetchError>(PageResult { rows: Vec::<Value>::new(), total: 10 })
        });
        grid.set_pagination_mode(PaginationMode::Server);

        let state = grid.page_state();
        assert_eq!(state.error, Some(FetchError::NoRuntime));
        assert_eq!(state.total, 0);
        assert!(!state.loading);
        assert!(grid.visible_rows().is_empty());
    }

    #[test]
    fn test_cell_helpers_for_unknown_column() {
        let grid = grid();
        let row = json!({"name": "x"});
        assert_eq!(grid.cell_raw_value(&row, "missing", 0), CellValue::Null);
        assert_eq!(grid.cell_render_output(&row, "missing", 0), None);
        assert!(grid.cell_class_list(&row, "missing", 0).is_empty());
        assert!(!grid.is_column_filter_enabled("missing"));
        assert!(grid.effective_filter_options("missing").is_none());
    }

    #[test]
    fn test_destroy_disconnects_listeners() {
        let grid = grid();
        let _sub = grid.sort_changed().connect(|_| {});
        grid.destroy();
        assert_eq!(grid.sort_changed().connection_count(), 0);
        assert!(grid.is_destroyed());
        assert_eq!(grid.visible_rows().len(), 3);
    }
}
