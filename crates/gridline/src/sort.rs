//! Sort engine.
//!
//! [`SortEngine`] owns the sort model and applies header interactions to it.
//! [`sort_rows`] produces a stable multi-key ordering of rows under a model:
//! entries are evaluated in priority order, the first non-equal comparison
//! decides, and rows equal under every key keep their input order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use gridline_core::logging::targets;

use crate::cell::raw_value;
use crate::column::{find_column, ColumnDef};
use crate::value::{CellValue, RowData, RowId};

/// Direction of an active sort entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Header click cycle: none, asc, desc, none.
    pub fn next(current: Option<SortDirection>) -> Option<SortDirection> {
        match current {
            None => Some(SortDirection::Asc),
            Some(SortDirection::Asc) => Some(SortDirection::Desc),
            Some(SortDirection::Desc) => None,
        }
    }

    pub fn is_descending(self) -> bool {
        self == SortDirection::Desc
    }
}

/// One entry of the sort model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: String,
    pub sort: SortDirection,
    /// Priority; lower values are evaluated first.
    #[serde(default)]
    pub sort_index: usize,
}

impl SortModelItem {
    pub fn new(col_id: impl Into<String>, sort: SortDirection) -> Self {
        Self {
            col_id: col_id.into(),
            sort,
            sort_index: 0,
        }
    }
}

/// Row context handed to custom comparators.
#[derive(Debug)]
pub struct RowNode<'a, T> {
    pub id: RowId,
    pub data: &'a T,
    pub row_index: usize,
    pub selected: bool,
}

/// Owns the active sort model.
#[derive(Debug, Clone, Default)]
pub struct SortEngine {
    model: Vec<SortModelItem>,
}

impl SortEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> &[SortModelItem] {
        &self.model
    }

    /// Replaces the model, reassigning priorities by position.
    ///
    /// A later entry for a column that already appeared is dropped, keeping
    /// at most one entry per column.
    pub fn set_model(&mut self, model: Vec<SortModelItem>) {
        let mut normalized: Vec<SortModelItem> = Vec::with_capacity(model.len());
        for item in model {
            if normalized.iter().any(|existing| existing.col_id == item.col_id) {
                continue;
            }
            normalized.push(item);
        }
        renumber(&mut normalized);
        tracing::debug!(target: targets::SORT, entries = normalized.len(), "sort model set");
        self.model = normalized;
    }

    pub fn clear(&mut self) {
        tracing::debug!(target: targets::SORT, "sort model cleared");
        self.model.clear();
    }

    /// Builds the initial model from the columns' `sort` and `sort_index`.
    pub fn seed_from_columns<T>(&mut self, columns: &[ColumnDef<T>]) {
        let mut seeded: Vec<&ColumnDef<T>> = columns.iter().filter(|col| col.sort.is_some()).collect();
        seeded.sort_by_key(|col| col.sort_index.unwrap_or(0));
        self.model = seeded
            .into_iter()
            .enumerate()
            .filter_map(|(position, col)| {
                col.sort.map(|sort| SortModelItem {
                    col_id: col.id().to_string(),
                    sort,
                    sort_index: col.sort_index.unwrap_or(position),
                })
            })
            .collect();
        tracing::debug!(target: targets::SORT, entries = self.model.len(), "sort model seeded from columns");
    }

    /// Applies a header click. Returns `false` if the column is not sortable.
    ///
    /// Without `multi` the whole model is replaced by the clicked column (or
    /// cleared once its cycle returns to none). With `multi` only the clicked
    /// column's entry is added, updated or removed.
    pub fn on_header_click<T>(&mut self, col: &ColumnDef<T>, multi: bool) -> bool {
        if !col.is_sortable() {
            return false;
        }
        let col_id = col.id();
        let position = self.model.iter().position(|item| item.col_id == col_id);
        let next = SortDirection::next(position.map(|i| self.model[i].sort));

        if !multi {
            self.model = match next {
                Some(sort) => vec![SortModelItem::new(col_id, sort)],
                None => Vec::new(),
            };
        } else {
            match (next, position) {
                (None, Some(i)) => {
                    self.model.remove(i);
                }
                (None, None) => {}
                (Some(sort), Some(i)) => self.model[i].sort = sort,
                (Some(sort), None) => self.model.push(SortModelItem::new(col_id, sort)),
            }
            renumber(&mut self.model);
        }

        tracing::debug!(target: targets::SORT, col_id, ?next, multi, "header click");
        true
    }

    /// Current direction of a column, or `None`.
    pub fn sort_for(&self, col_id: &str) -> Option<SortDirection> {
        self.model.iter().find(|item| item.col_id == col_id).map(|item| item.sort)
    }

    /// Priority of a column, only reported while more than one entry is active.
    pub fn sort_index_for(&self, col_id: &str) -> Option<usize> {
        if self.model.len() < 2 {
            return None;
        }
        self.model
            .iter()
            .find(|item| item.col_id == col_id)
            .map(|item| item.sort_index)
    }
}

fn renumber(model: &mut [SortModelItem]) {
    for (i, item) in model.iter_mut().enumerate() {
        item.sort_index = i;
    }
}

/// Built-in comparison in ascending terms.
///
/// Nulls sort after everything else, numbers compare arithmetically, then
/// values readable as dates compare by time, and everything else compares as
/// case-insensitive text with lowercase before uppercase on ties.
pub fn default_compare(a: &CellValue, b: &CellValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }

    if let (Some(x), Some(y)) = (a.as_timestamp(), b.as_timestamp()) {
        return x.cmp(&y);
    }

    compare_text(&a.to_text(), &b.to_text())
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| {
        for (x, y) in a.chars().zip(b.chars()) {
            if x != y {
                return match (x.is_lowercase(), y.is_lowercase()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => x.cmp(&y),
                };
            }
        }
        a.len().cmp(&b.len())
    })
}

/// Returns the rows ordered by `model`.
///
/// Entries whose column is missing from `columns` are skipped. `node_info`
/// supplies the identity and selection state for custom comparators; it is
/// only called when some active column has one. Each row's position in
/// `rows` is its row index for value getters.
pub fn sort_rows<T>(
    rows: &[T],
    model: &[SortModelItem],
    columns: &[ColumnDef<T>],
    node_info: &dyn Fn(&T, usize) -> (RowId, bool),
) -> Vec<T>
where
    T: RowData + Clone,
{
    let mut entries: Vec<(&ColumnDef<T>, SortDirection, usize)> = model
        .iter()
        .filter_map(|item| find_column(columns, &item.col_id).map(|col| (col, item.sort, item.sort_index)))
        .collect();
    entries.sort_by_key(|&(_, _, priority)| priority);

    if entries.is_empty() {
        return rows.to_vec();
    }

    tracing::trace!(target: targets::SORT, rows = rows.len(), keys = entries.len(), "sorting rows");

    // Resolve every key once per row instead of once per comparison.
    let keys: Vec<Vec<CellValue>> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| entries.iter().map(|(col, _, _)| raw_value(row, col, index)).collect())
        .collect();

    let needs_nodes = entries.iter().any(|(col, _, _)| col.comparator.is_some());
    let nodes: Vec<(RowId, bool)> = if needs_nodes {
        rows.iter().enumerate().map(|(index, row)| node_info(row, index)).collect()
    } else {
        Vec::new()
    };
    let node = |index: usize| {
        let (id, selected) = nodes.get(index).cloned().unwrap_or((RowId::index(index), false));
        RowNode {
            id,
            data: &rows[index],
            row_index: index,
            selected,
        }
    };

    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        for (key, (col, direction, _)) in entries.iter().enumerate() {
            let descending = direction.is_descending();
            let value_a = &keys[a][key];
            let value_b = &keys[b][key];
            let cmp = match &col.comparator {
                Some(comparator) => comparator(value_a, value_b, &node(a), &node(b), descending),
                None => default_compare(value_a, value_b),
            };
            if cmp != Ordering::Equal {
                return if descending { cmp.reverse() } else { cmp };
            }
        }
        Ordering::Equal
    });

    order.into_iter().map(|index| rows[index].clone()).collect()
}
