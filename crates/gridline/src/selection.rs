//! Row selection tracking.
//!
//! [`SelectionTracker`] keeps the set of selected row identities. It never
//! stores rows: the selected rows are derived on demand by filtering the
//! current data set through [`RowIdentity`], so the result follows data
//! order rather than click order.
//!
//! # Example
//!
//! ```
//! use gridline::selection::{RowSelection, SelectionTracker};
//! use gridline::RowId;
//!
//! let mut selection = SelectionTracker::new(RowSelection::Multiple);
//! selection.on_row_click(RowId::Int(1));
//! selection.on_row_click(RowId::Int(2));
//! selection.on_row_click(RowId::Int(1));
//! assert!(!selection.is_selected(&RowId::Int(1)));
//! assert!(selection.is_selected(&RowId::Int(2)));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{RowData, RowId};

/// Custom row-id extractor. Returning `None` falls back to the default rule.
pub type RowIdFn<T> = Arc<dyn Fn(&T, usize) -> Option<RowId> + Send + Sync>;

/// Selection behavior on row click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowSelection {
    /// Clicks do not select.
    #[default]
    None,
    /// A click selects exactly the clicked row.
    Single,
    /// A click toggles the clicked row.
    Multiple,
}

/// Derives row identities: custom extractor, then the `id` field, then the
/// row's position.
pub struct RowIdentity<T> {
    extractor: Option<RowIdFn<T>>,
}

impl<T> RowIdentity<T> {
    pub fn new(extractor: Option<RowIdFn<T>>) -> Self {
        Self { extractor }
    }
}

impl<T: RowData> RowIdentity<T> {
    /// Identity of `row` at position `index`.
    pub fn id_of(&self, row: &T, index: usize) -> RowId {
        if let Some(id) = self.extractor.as_ref().and_then(|f| f(row, index)) {
            return id;
        }
        RowId::from_value(&row.field("id")).unwrap_or_else(|| RowId::index(index))
    }
}

impl<T> Default for RowIdentity<T> {
    fn default() -> Self {
        Self { extractor: None }
    }
}

impl<T> Clone for RowIdentity<T> {
    fn clone(&self) -> Self {
        Self {
            extractor: self.extractor.clone(),
        }
    }
}

impl<T> fmt::Debug for RowIdentity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowIdentity")
            .field("custom", &self.extractor.is_some())
            .finish()
    }
}

/// Tracks selected row identities under a [`RowSelection`] mode.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    mode: RowSelection,
    selected: BTreeSet<RowId>,
}

impl SelectionTracker {
    pub fn new(mode: RowSelection) -> Self {
        Self {
            mode,
            selected: BTreeSet::new(),
        }
    }

    pub fn mode(&self) -> RowSelection {
        self.mode
    }

    /// Changes the mode. The current selection is kept as is.
    pub fn set_mode(&mut self, mode: RowSelection) {
        self.mode = mode;
    }

    /// Applies a row click. Returns `false` when the mode ignores clicks.
    ///
    /// In single mode the set is replaced even if the row was already the
    /// only selected one.
    pub fn on_row_click(&mut self, id: RowId) -> bool {
        match self.mode {
            RowSelection::None => false,
            RowSelection::Single => {
                self.selected.clear();
                self.selected.insert(id);
                true
            }
            RowSelection::Multiple => {
                if !self.selected.remove(&id) {
                    self.selected.insert(id);
                }
                true
            }
        }
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.selected.contains(id)
    }

    /// Empties the selection.
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Selected identities, in identity order.
    pub fn selected_ids(&self) -> Vec<RowId> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Rows of `data` whose identity is selected, in data order.
    pub fn selected_rows<T: RowData + Clone>(&self, data: &[T], identity: &RowIdentity<T>) -> Vec<T> {
        if self.selected.is_empty() {
            return Vec::new();
        }
        data.iter()
            .enumerate()
            .filter(|(index, row)| self.selected.contains(&identity.id_of(row, *index)))
            .map(|(_, row)| row.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_none_mode_ignores_clicks() {
        let mut selection = SelectionTracker::new(RowSelection::None);
        assert!(!selection.on_row_click(RowId::Int(1)));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_single_mode_replaces() {
        let mut selection = SelectionTracker::new(RowSelection::Single);
        selection.on_row_click(RowId::Int(1));
        selection.on_row_click(RowId::Int(2));
        assert_eq!(selection.selected_ids(), vec![RowId::Int(2)]);

        // No toggle-off in single mode.
        selection.on_row_click(RowId::Int(2));
        assert_eq!(selection.selected_ids(), vec![RowId::Int(2)]);
    }

    #[test]
    fn test_multiple_mode_toggles() {
        let mut selection = SelectionTracker::new(RowSelection::Multiple);
        selection.on_row_click(RowId::Int(1));
        selection.on_row_click(RowId::Int(2));
        selection.on_row_click(RowId::Int(1));
        assert_eq!(selection.selected_ids(), vec![RowId::Int(2)]);
        selection.clear();
        assert_eq!(selection.len(), 0);
    }

    #[test]
    fn test_identity_fallbacks() {
        let identity = RowIdentity::<Value>::default();
        assert_eq!(identity.id_of(&json!({"id": "a"}), 4), RowId::Text("a".into()));
        assert_eq!(identity.id_of(&json!({"name": "x"}), 4), RowId::Int(4));

        let custom = RowIdentity::<Value>::new(Some(Arc::new(|row: &Value, _: usize| {
            row.get("key").and_then(Value::as_str).map(RowId::from)
        })));
        assert_eq!(custom.id_of(&json!({"key": "k", "id": 1}), 0), RowId::Text("k".into()));
        assert_eq!(custom.id_of(&json!({"id": 1}), 0), RowId::Int(1));
    }

    #[test]
    fn test_selected_rows_follow_data_order() {
        let data = vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})];
        let identity = RowIdentity::default();
        let mut selection = SelectionTracker::new(RowSelection::Multiple);
        selection.on_row_click(RowId::Int(3));
        selection.on_row_click(RowId::Int(1));

        let rows = selection.selected_rows(&data, &identity);
        assert_eq!(rows, vec![json!({"id": 1}), json!({"id": 3})]);
    }
}
