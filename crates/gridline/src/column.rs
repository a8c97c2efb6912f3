//! Column definitions and the column resolver.
//!
//! A [`ColumnDef`] is declarative: every field is optional so that a grid-wide
//! default definition can be overlaid field by field with the per-column
//! definition. [`resolve_columns`] performs that overlay and produces the
//! effective column set every other engine reads.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cell::{CellRendererParams, ValueGetterParams};
use crate::filter::{ColumnFilter, FilterOperator};
use crate::layout::PinnedSide;
use crate::options::GridConfig;
use crate::sort::{RowNode, SortDirection};
use crate::value::CellValue;

/// Computes a cell's raw value.
pub type ValueGetter<T> = Arc<dyn Fn(&ValueGetterParams<'_, T>) -> CellValue + Send + Sync>;

/// Turns a raw value into its display value. Receives the raw value as `value`.
pub type ValueFormatter<T> = Arc<dyn Fn(&ValueGetterParams<'_, T>) -> CellValue + Send + Sync>;

/// Produces a cell's rendered output.
pub type CellRenderer<T> = Arc<dyn Fn(&CellRendererParams<'_, T>) -> CellValue + Send + Sync>;

/// Custom sort comparison: `(a, b, node_a, node_b, is_descending)`.
///
/// The result is reversed by the sort engine for descending entries, so the
/// comparator should always answer in ascending terms.
pub type Comparator<T> = Arc<
    dyn Fn(&CellValue, &CellValue, &RowNode<'_, T>, &RowNode<'_, T>, bool) -> Ordering
        + Send
        + Sync,
>;

/// Replaces the built-in operator matching for one column.
pub type ColumnFilterPredicate = Arc<dyn Fn(&CellValue, &ColumnFilter) -> bool + Send + Sync>;

/// Computes extra CSS classes for a cell.
pub type CellClassFn<T> = Arc<dyn Fn(&CellRendererParams<'_, T>) -> Vec<String> + Send + Sync>;

/// Horizontal alignment of a cell or header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// Left aligned.
    Left,
    /// Centered.
    Center,
    /// Right aligned.
    Right,
}

impl Align {
    /// The alignment's CSS class name.
    pub fn class_name(self) -> &'static str {
        match self {
            Align::Left => "align-left",
            Align::Center => "align-center",
            Align::Right => "align-right",
        }
    }
}

/// Static or computed CSS classes for a column's cells.
pub enum CellClass<T> {
    /// Fixed class list.
    Static(Vec<String>),
    /// Classes computed per cell.
    Dynamic(CellClassFn<T>),
}

impl<T> Clone for CellClass<T> {
    fn clone(&self) -> Self {
        match self {
            CellClass::Static(classes) => CellClass::Static(classes.clone()),
            CellClass::Dynamic(f) => CellClass::Dynamic(f.clone()),
        }
    }
}

impl<T> fmt::Debug for CellClass<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellClass::Static(classes) => f.debug_tuple("Static").field(classes).finish(),
            CellClass::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Detailed per-column filter options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnFilterOptions {
    pub enabled: Option<bool>,
    pub show_popup: Option<bool>,
    pub operators: Option<Vec<FilterOperator>>,
    pub placeholder: Option<String>,
    pub case_sensitive: Option<bool>,
}

/// A column's filter configuration: a plain switch or detailed options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterConfig {
    /// `true` enables filtering with default options, `false` disables it.
    Enabled(bool),
    /// Detailed options.
    Options(ColumnFilterOptions),
}

/// Filter options after applying column, grid and built-in fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveFilterOptions {
    pub enabled: bool,
    pub show_popup: bool,
    pub placeholder: String,
    pub case_sensitive: bool,
    pub operators: Vec<FilterOperator>,
}

/// Placeholder used when neither the column nor the grid sets one.
pub const DEFAULT_FILTER_PLACEHOLDER: &str = "Filter...";

/// Declarative definition of one column.
///
/// Built with struct update syntax or the `with_*` builder methods:
///
/// ```
/// use gridline::{Align, ColumnDef};
/// use serde_json::Value;
///
/// let col: ColumnDef<Value> = ColumnDef::field("age")
///     .with_header_name("Age")
///     .with_align(Align::Right)
///     .with_sortable(true);
/// assert_eq!(col.id(), "age");
/// ```
pub struct ColumnDef<T> {
    pub col_id: Option<String>,
    pub field: Option<String>,
    pub header_name: Option<String>,
    pub header_tooltip: Option<String>,
    pub sortable: Option<bool>,
    /// Initial sort direction, used to seed the sort model.
    pub sort: Option<SortDirection>,
    /// Initial sort priority, used to seed the sort model.
    pub sort_index: Option<usize>,
    pub filter: Option<FilterConfig>,
    pub filter_predicate: Option<ColumnFilterPredicate>,
    pub value_getter: Option<ValueGetter<T>>,
    pub value_formatter: Option<ValueFormatter<T>>,
    pub cell_renderer: Option<CellRenderer<T>>,
    pub comparator: Option<Comparator<T>>,
    pub cell_class: Option<CellClass<T>>,
    pub align: Option<Align>,
    pub header_align: Option<Align>,
    pub width: Option<f32>,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
    pub resizable: Option<bool>,
    pub pinned: Option<PinnedSide>,
}

impl<T> Default for ColumnDef<T> {
    fn default() -> Self {
        Self {
            col_id: None,
            field: None,
            header_name: None,
            header_tooltip: None,
            sortable: None,
            sort: None,
            sort_index: None,
            filter: None,
            filter_predicate: None,
            value_getter: None,
            value_formatter: None,
            cell_renderer: None,
            comparator: None,
            cell_class: None,
            align: None,
            header_align: None,
            width: None,
            min_width: None,
            max_width: None,
            resizable: None,
            pinned: None,
        }
    }
}

impl<T> Clone for ColumnDef<T> {
    fn clone(&self) -> Self {
        Self {
            col_id: self.col_id.clone(),
            field: self.field.clone(),
            header_name: self.header_name.clone(),
            header_tooltip: self.header_tooltip.clone(),
            sortable: self.sortable,
            sort: self.sort,
            sort_index: self.sort_index,
            filter: self.filter.clone(),
            filter_predicate: self.filter_predicate.clone(),
            value_getter: self.value_getter.clone(),
            value_formatter: self.value_formatter.clone(),
            cell_renderer: self.cell_renderer.clone(),
            comparator: self.comparator.clone(),
            cell_class: self.cell_class.clone(),
            align: self.align,
            header_align: self.header_align,
            width: self.width,
            min_width: self.min_width,
            max_width: self.max_width,
            resizable: self.resizable,
            pinned: self.pinned,
        }
    }
}

impl<T> fmt::Debug for ColumnDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("col_id", &self.col_id)
            .field("field", &self.field)
            .field("header_name", &self.header_name)
            .field("sortable", &self.sortable)
            .field("sort", &self.sort)
            .field("sort_index", &self.sort_index)
            .field("filter", &self.filter)
            .field("has_filter_predicate", &self.filter_predicate.is_some())
            .field("has_value_getter", &self.value_getter.is_some())
            .field("has_value_formatter", &self.value_formatter.is_some())
            .field("has_cell_renderer", &self.cell_renderer.is_some())
            .field("has_comparator", &self.comparator.is_some())
            .field("cell_class", &self.cell_class)
            .field("align", &self.align)
            .field("width", &self.width)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl<T> ColumnDef<T> {
    /// A column reading the given dotted field path.
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::default()
        }
    }

    /// A column identified only by id, typically paired with a value getter.
    pub fn with_id(col_id: impl Into<String>) -> Self {
        Self {
            col_id: Some(col_id.into()),
            ..Self::default()
        }
    }

    /// The column id: `col_id`, else `field`, else the empty string.
    pub fn id(&self) -> &str {
        self.col_id
            .as_deref()
            .or(self.field.as_deref())
            .unwrap_or("")
    }

    /// Header text: `header_name`, else the id.
    pub fn header_label(&self) -> &str {
        self.header_name.as_deref().unwrap_or_else(|| self.id())
    }

    /// Whether header clicks may change this column's sort.
    pub fn is_sortable(&self) -> bool {
        self.sortable != Some(false)
    }

    /// Whether the column width may be changed.
    pub fn is_resizable(&self) -> bool {
        self.resizable != Some(false)
    }

    /// Field-by-field overlay: values set on `self` win over `base`.
    pub fn overlay(&self, base: &ColumnDef<T>) -> ColumnDef<T> {
        let def = self.clone();
        let base = base.clone();
        ColumnDef {
            col_id: def.col_id.or(base.col_id),
            field: def.field.or(base.field),
            header_name: def.header_name.or(base.header_name),
            header_tooltip: def.header_tooltip.or(base.header_tooltip),
            sortable: def.sortable.or(base.sortable),
            sort: def.sort.or(base.sort),
            sort_index: def.sort_index.or(base.sort_index),
            filter: def.filter.or(base.filter),
            filter_predicate: def.filter_predicate.or(base.filter_predicate),
            value_getter: def.value_getter.or(base.value_getter),
            value_formatter: def.value_formatter.or(base.value_formatter),
            cell_renderer: def.cell_renderer.or(base.cell_renderer),
            comparator: def.comparator.or(base.comparator),
            cell_class: def.cell_class.or(base.cell_class),
            align: def.align.or(base.align),
            header_align: def.header_align.or(base.header_align),
            width: def.width.or(base.width),
            min_width: def.min_width.or(base.min_width),
            max_width: def.max_width.or(base.max_width),
            resizable: def.resizable.or(base.resizable),
            pinned: def.pinned.or(base.pinned),
        }
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    pub fn with_header_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.header_tooltip = Some(tooltip.into());
        self
    }

    pub fn with_col_id(mut self, col_id: impl Into<String>) -> Self {
        self.col_id = Some(col_id.into());
        self
    }

    pub fn with_sortable(mut self, sortable: bool) -> Self {
        self.sortable = Some(sortable);
        self
    }

    pub fn with_sort(mut self, direction: SortDirection) -> Self {
        self.sort = Some(direction);
        self
    }

    pub fn with_sort_index(mut self, index: usize) -> Self {
        self.sort_index = Some(index);
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_filter_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CellValue, &ColumnFilter) -> bool + Send + Sync + 'static,
    {
        self.filter_predicate = Some(Arc::new(predicate));
        self
    }

    pub fn with_value_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&ValueGetterParams<'_, T>) -> CellValue + Send + Sync + 'static,
    {
        self.value_getter = Some(Arc::new(getter));
        self
    }

    pub fn with_value_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&ValueGetterParams<'_, T>) -> CellValue + Send + Sync + 'static,
    {
        self.value_formatter = Some(Arc::new(formatter));
        self
    }

    pub fn with_cell_renderer<F>(mut self, renderer: F) -> Self
    where
        F: Fn(&CellRendererParams<'_, T>) -> CellValue + Send + Sync + 'static,
    {
        self.cell_renderer = Some(Arc::new(renderer));
        self
    }

    pub fn with_comparator<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&CellValue, &CellValue, &RowNode<'_, T>, &RowNode<'_, T>, bool) -> Ordering
            + Send
            + Sync
            + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    pub fn with_cell_class(mut self, class: CellClass<T>) -> Self {
        self.cell_class = Some(class);
        self
    }

    pub fn with_align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn with_header_align(mut self, align: Align) -> Self {
        self.header_align = Some(align);
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_min_width(mut self, width: f32) -> Self {
        self.min_width = Some(width);
        self
    }

    pub fn with_max_width(mut self, width: f32) -> Self {
        self.max_width = Some(width);
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = Some(resizable);
        self
    }

    pub fn with_pinned(mut self, side: PinnedSide) -> Self {
        self.pinned = Some(side);
        self
    }
}

/// Merges each raw definition over the default definition.
///
/// The resulting `col_id` is always set: the raw definition's `col_id`, else
/// its `field`, else the empty string. Duplicate ids are not rejected.
pub fn resolve_columns<T>(raw: &[ColumnDef<T>], default: Option<&ColumnDef<T>>) -> Vec<ColumnDef<T>> {
    raw.iter()
        .map(|def| {
            let mut effective = match default {
                Some(base) => def.overlay(base),
                None => def.clone(),
            };
            effective.col_id = Some(def.id().to_string());
            effective
        })
        .collect()
}

/// Finds a column by id. With duplicate ids the last definition wins.
pub fn find_column<'a, T>(columns: &'a [ColumnDef<T>], col_id: &str) -> Option<&'a ColumnDef<T>> {
    columns.iter().rev().find(|col| col.id() == col_id)
}

/// Whether filtering is enabled for a column, honouring the grid-wide switch.
pub fn is_column_filter_enabled<T>(col: &ColumnDef<T>, config: &GridConfig) -> bool {
    if !config.enable_column_filter {
        return false;
    }
    match &col.filter {
        Some(FilterConfig::Enabled(enabled)) => *enabled,
        Some(FilterConfig::Options(options)) => options.enabled.unwrap_or(true),
        None => true,
    }
}

/// Resolves a column's filter options against grid defaults and built-ins.
pub fn effective_filter_options<T>(col: &ColumnDef<T>, config: &GridConfig) -> EffectiveFilterOptions {
    let defaults = config.column_filter_defaults.clone().unwrap_or_default();
    let (enabled, options) = match &col.filter {
        Some(FilterConfig::Enabled(enabled)) => (*enabled, ColumnFilterOptions::default()),
        Some(FilterConfig::Options(options)) => (options.enabled.unwrap_or(true), options.clone()),
        None => (true, ColumnFilterOptions::default()),
    };

    EffectiveFilterOptions {
        enabled,
        show_popup: options.show_popup.or(defaults.show_popup).unwrap_or(true),
        placeholder: options
            .placeholder
            .or(defaults.placeholder)
            .unwrap_or_else(|| DEFAULT_FILTER_PLACEHOLDER.to_string()),
        case_sensitive: options.case_sensitive.or(defaults.case_sensitive).unwrap_or(false),
        operators: options
            .operators
            .or(defaults.operators)
            .unwrap_or_else(|| FilterOperator::DEFAULT_OPERATORS.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_resolve_overlays_default() {
        let default = ColumnDef::<Value>::default()
            .with_sortable(false)
            .with_width(200.0)
            .with_align(Align::Left);
        let raw = vec![
            ColumnDef::field("name"),
            ColumnDef::field("age").with_sortable(true).with_col_id("years"),
        ];

        let cols = resolve_columns(&raw, Some(&default));
        assert_eq!(cols[0].col_id.as_deref(), Some("name"));
        assert_eq!(cols[0].sortable, Some(false));
        assert_eq!(cols[0].width, Some(200.0));
        assert_eq!(cols[1].col_id.as_deref(), Some("years"));
        assert_eq!(cols[1].sortable, Some(true));
        assert_eq!(cols[1].align, Some(Align::Left));
    }

    #[test]
    fn test_resolve_forces_empty_id() {
        let default = ColumnDef::<Value>::default().with_col_id("from-default");
        let cols = resolve_columns(&[ColumnDef::default()], Some(&default));
        assert_eq!(cols[0].col_id.as_deref(), Some(""));
    }

    #[test]
    fn test_find_column_last_wins() {
        let cols = resolve_columns::<Value>(
            &[
                ColumnDef::field("a").with_header_name("first"),
                ColumnDef::field("a").with_header_name("second"),
            ],
            None,
        );
        assert_eq!(find_column(&cols, "a").unwrap().header_label(), "second");
        assert!(find_column(&cols, "b").is_none());
    }

    #[test]
    fn test_filter_options_fallbacks() {
        let config = GridConfig {
            column_filter_defaults: Some(ColumnFilterOptions {
                placeholder: Some("Search".into()),
                ..Default::default()
            }),
            ..GridConfig::default()
        };
        let col = ColumnDef::<Value>::field("a").with_filter(FilterConfig::Options(ColumnFilterOptions {
            case_sensitive: Some(true),
            ..Default::default()
        }));

        let options = effective_filter_options(&col, &config);
        assert!(options.enabled);
        assert!(options.show_popup);
        assert!(options.case_sensitive);
        assert_eq!(options.placeholder, "Search");
        assert_eq!(options.operators.len(), 10);
    }

    #[test]
    fn test_filter_enabled_switches() {
        let mut config = GridConfig::default();
        let col = ColumnDef::<Value>::field("a");
        assert!(is_column_filter_enabled(&col, &config));

        let off = ColumnDef::<Value>::field("a").with_filter(FilterConfig::Enabled(false));
        assert!(!is_column_filter_enabled(&off, &config));

        config.enable_column_filter = false;
        assert!(!is_column_filter_enabled(&col, &config));
    }
}
