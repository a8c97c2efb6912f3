//! Filter engine.
//!
//! [`FilterEngine`] owns the global search text and the per-column filters
//! (at most one per column, kept in insertion order). [`FilterEngine::apply`]
//! keeps a row only if every column filter matches and, when global text is
//! set, the global search matches too.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gridline_core::logging::targets;

use crate::cell::raw_value;
use crate::column::{find_column, ColumnDef};
use crate::value::{CellValue, RowData};

/// Replaces the built-in global search: `(row, trimmed_text) -> keep`.
pub type GlobalFilterPredicate<T> = Arc<dyn Fn(&T, &str) -> bool + Send + Sync>;

/// Operator of a column filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    /// Operators offered by a column filter unless configured otherwise.
    pub const DEFAULT_OPERATORS: [FilterOperator; 10] = [
        FilterOperator::Contains,
        FilterOperator::Equals,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::IsEmpty,
        FilterOperator::IsNotEmpty,
    ];

    /// Wire name of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Contains => "contains",
            FilterOperator::Equals => "equals",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::IsEmpty => "isEmpty",
            FilterOperator::IsNotEmpty => "isNotEmpty",
        }
    }
}

/// A filter on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFilter {
    pub col_id: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: CellValue,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl ColumnFilter {
    pub fn new(col_id: impl Into<String>, operator: FilterOperator, value: impl Into<CellValue>) -> Self {
        Self {
            col_id: col_id.into(),
            operator,
            value: value.into(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

/// The complete filter state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterModel {
    pub global_text: String,
    pub column_filters: Vec<ColumnFilter>,
}

/// Externally supplied column filters: a list, or a record keyed by column id.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFiltersInput {
    List(Vec<ColumnFilter>),
    Record(serde_json::Value),
}

impl ColumnFiltersInput {
    pub fn into_filters(self) -> Vec<ColumnFilter> {
        match self {
            ColumnFiltersInput::List(list) => list,
            ColumnFiltersInput::Record(record) => column_filters_from_record(&record),
        }
    }
}

impl From<Vec<ColumnFilter>> for ColumnFiltersInput {
    fn from(list: Vec<ColumnFilter>) -> Self {
        ColumnFiltersInput::List(list)
    }
}

impl From<serde_json::Value> for ColumnFiltersInput {
    fn from(record: serde_json::Value) -> Self {
        ColumnFiltersInput::Record(record)
    }
}

/// Reads filters from a record keyed by column id.
///
/// An object value with an `operator` key is read as a full filter; any
/// other value becomes a `contains` filter on that column. Entries that fail
/// to parse are skipped.
pub fn column_filters_from_record(record: &serde_json::Value) -> Vec<ColumnFilter> {
    let Some(map) = record.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(col_id, value)| match value {
            serde_json::Value::Object(fields) if fields.contains_key("operator") => {
                let mut fields = fields.clone();
                fields.insert("colId".to_string(), serde_json::Value::String(col_id.clone()));
                match serde_json::from_value::<ColumnFilter>(serde_json::Value::Object(fields)) {
                    Ok(filter) => Some(filter),
                    Err(err) => {
                        tracing::trace!(target: targets::FILTER, col_id = %col_id, %err, "skipping malformed column filter");
                        None
                    }
                }
            }
            other => Some(ColumnFilter::new(col_id.clone(), FilterOperator::Contains, CellValue::from(other))),
        })
        .collect()
}

/// Owns global and per-column filter state.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    global_text: String,
    column_filters: Vec<ColumnFilter>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_text(&self) -> &str {
        &self.global_text
    }

    /// Returns `true` if the text changed.
    pub fn set_global_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.global_text == text {
            return false;
        }
        tracing::debug!(target: targets::FILTER, text = %text, "global filter text set");
        self.global_text = text;
        true
    }

    pub fn column_filters(&self) -> &[ColumnFilter] {
        &self.column_filters
    }

    pub fn column_filter(&self, col_id: &str) -> Option<&ColumnFilter> {
        self.column_filters.iter().find(|f| f.col_id == col_id)
    }

    /// Adds or replaces the filter for its column. Filters without a column
    /// id are ignored. Returns `true` if the state changed.
    pub fn set_column_filter(&mut self, filter: ColumnFilter) -> bool {
        if filter.col_id.is_empty() {
            return false;
        }
        let changed = upsert(&mut self.column_filters, filter);
        if changed {
            tracing::debug!(target: targets::FILTER, filters = self.column_filters.len(), "column filter set");
        }
        changed
    }

    /// Returns `true` if a filter was removed.
    pub fn clear_column_filter(&mut self, col_id: &str) -> bool {
        let before = self.column_filters.len();
        self.column_filters.retain(|f| f.col_id != col_id);
        before != self.column_filters.len()
    }

    /// Replaces every column filter. Later entries for the same column win.
    pub fn replace_column_filters(&mut self, filters: Vec<ColumnFilter>) -> bool {
        let mut next = Vec::with_capacity(filters.len());
        for filter in filters.into_iter().filter(|f| !f.col_id.is_empty()) {
            upsert(&mut next, filter);
        }
        if next == self.column_filters {
            return false;
        }
        self.column_filters = next;
        true
    }

    /// Clears global text and all column filters.
    pub fn clear_all(&mut self) -> bool {
        let changed = !self.global_text.is_empty() || !self.column_filters.is_empty();
        self.global_text.clear();
        self.column_filters.clear();
        changed
    }

    pub fn model(&self) -> FilterModel {
        FilterModel {
            global_text: self.global_text.clone(),
            column_filters: self.column_filters.clone(),
        }
    }

    /// Whether applying the filters could exclude anything.
    pub fn is_active(&self) -> bool {
        !self.global_text.trim().is_empty() || !self.column_filters.is_empty()
    }

    /// Filters `rows`.
    ///
    /// Returns the input slice itself when no filter is active. Column
    /// filters whose column no longer exists are ignored. The global search
    /// looks at the raw value of every column, not only filterable ones.
    pub fn apply<'a, T>(
        &self,
        rows: &'a [T],
        columns: &[ColumnDef<T>],
        global_predicate: Option<&GlobalFilterPredicate<T>>,
    ) -> Cow<'a, [T]>
    where
        T: RowData + Clone,
    {
        if !self.is_active() {
            return Cow::Borrowed(rows);
        }

        let global = self.global_text.trim();
        let global_lower = global.to_lowercase();
        let active: Vec<(&ColumnFilter, &ColumnDef<T>)> = self
            .column_filters
            .iter()
            .filter_map(|filter| find_column(columns, &filter.col_id).map(|col| (filter, col)))
            .collect();

        let kept: Vec<T> = rows
            .iter()
            .enumerate()
            .filter(|&(index, row)| {
                let columns_match = active.iter().all(|(filter, col)| {
                    let value = raw_value(row, col, index);
                    match &col.filter_predicate {
                        Some(predicate) => predicate(&value, filter),
                        None => matches_operator(&value, filter),
                    }
                });
                if !columns_match {
                    return false;
                }
                if global.is_empty() {
                    return true;
                }
                match global_predicate {
                    Some(predicate) => predicate(row, global),
                    None => columns.iter().any(|col| {
                        raw_value(row, col, index)
                            .to_text()
                            .to_lowercase()
                            .contains(&global_lower)
                    }),
                }
            })
            .map(|(_, row)| row.clone())
            .collect();

        tracing::trace!(target: targets::FILTER, input = rows.len(), kept = kept.len(), "rows filtered");
        Cow::Owned(kept)
    }
}

fn upsert(filters: &mut Vec<ColumnFilter>, filter: ColumnFilter) -> bool {
    match filters.iter_mut().find(|f| f.col_id == filter.col_id) {
        Some(existing) if *existing == filter => false,
        Some(existing) => {
            *existing = filter;
            true
        }
        None => {
            filters.push(filter);
            true
        }
    }
}

fn fold_case(s: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.to_lowercase())
    }
}

fn compare_ordered(value: &CellValue, target: &CellValue) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (value.as_number_lenient(), target.as_number_lenient()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (value.as_timestamp(), target.as_timestamp()) {
        return Some(a.cmp(&b));
    }
    None
}

/// Built-in operator matching of one cell value against a filter.
///
/// Mismatched types make ordered comparisons fail rather than error.
pub fn matches_operator(value: &CellValue, filter: &ColumnFilter) -> bool {
    use std::cmp::Ordering;

    let target = &filter.value;
    let text = |v: &CellValue| -> String { fold_case(&v.to_text(), filter.case_sensitive).into_owned() };

    match filter.operator {
        FilterOperator::Contains => text(value).contains(&text(target)),
        FilterOperator::StartsWith => text(value).starts_with(&text(target)),
        FilterOperator::EndsWith => text(value).ends_with(&text(target)),
        FilterOperator::Equals => {
            if let (Some(a), Some(b)) = (value.as_number_lenient(), target.as_number_lenient()) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (value.as_timestamp(), target.as_timestamp()) {
                return a == b;
            }
            text(value) == text(target)
        }
        FilterOperator::Gt => compare_ordered(value, target) == Some(Ordering::Greater),
        FilterOperator::Gte => matches!(compare_ordered(value, target), Some(Ordering::Greater | Ordering::Equal)),
        FilterOperator::Lt => compare_ordered(value, target) == Some(Ordering::Less),
        FilterOperator::Lte => matches!(compare_ordered(value, target), Some(Ordering::Less | Ordering::Equal)),
        FilterOperator::In => membership(value, target),
        FilterOperator::NotIn => !membership(value, target),
        FilterOperator::IsEmpty => value.is_empty_value(),
        FilterOperator::IsNotEmpty => !value.is_empty_value(),
    }
}

fn membership(value: &CellValue, set: &CellValue) -> bool {
    match set {
        CellValue::List(items) => items.iter().any(|item| value.strict_eq(item)),
        single => value.strict_eq(single),
    }
}
