//! Column width and pin state.
//!
//! The grid does not lay anything out; it only keeps the per-column state a
//! renderer needs: the current width (clamped to the column's bounds) and
//! which edge, if any, the column is pinned to. Offsets of pinned columns are
//! derived from that state in column order.

use serde::{Deserialize, Serialize};

use crate::column::{find_column, ColumnDef};

/// Width used when neither the layout state nor the column sets one.
pub const DEFAULT_COLUMN_WIDTH: f32 = 150.0;
/// Minimum width unless the column sets `min_width`.
pub const DEFAULT_MIN_WIDTH: f32 = 60.0;
/// Maximum width unless the column sets `max_width`.
pub const DEFAULT_MAX_WIDTH: f32 = 320.0;

/// Edge a column is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinnedSide {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnState {
    width: Option<f32>,
    pinned: Option<PinnedSide>,
}

/// Per-column layout state, kept in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnLayout {
    order: Vec<String>,
    states: Vec<(String, ColumnState)>,
}

impl ColumnLayout {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, col_id: &str) -> Option<&ColumnState> {
        self.states.iter().find(|(id, _)| id == col_id).map(|(_, st)| st)
    }

    fn state_mut(&mut self, col_id: &str) -> Option<&mut ColumnState> {
        self.states.iter_mut().find(|(id, _)| id == col_id).map(|(_, st)| st)
    }

    /// Brings the state in line with a new column set.
    ///
    /// New columns start from their definition, existing ones keep what was
    /// set on them (gaps are filled from the definition), and state for
    /// columns that disappeared is dropped. Returns `true` if anything changed.
    pub fn reconcile<T>(&mut self, columns: &[ColumnDef<T>]) -> bool {
        let before = self.clone();
        self.order = columns
            .iter()
            .map(|col| col.id().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        for col in columns {
            let id = col.id();
            if id.is_empty() {
                continue;
            }
            match self.state_mut(id) {
                Some(state) => {
                    state.width = state.width.or(col.width);
                    state.pinned = state.pinned.or(col.pinned);
                }
                None => self.states.push((
                    id.to_string(),
                    ColumnState {
                        width: col.width,
                        pinned: col.pinned,
                    },
                )),
            }
        }

        let order = &self.order;
        self.states.retain(|(id, _)| order.contains(id));
        *self != before
    }

    /// Lower width bound of a column, at least 1.
    pub fn min_width<T>(&self, columns: &[ColumnDef<T>], col_id: &str) -> f32 {
        let min = find_column(columns, col_id)
            .and_then(|col| col.min_width)
            .unwrap_or(DEFAULT_MIN_WIDTH);
        min.floor().max(1.0)
    }

    /// Upper width bound of a column, never below its minimum.
    pub fn max_width<T>(&self, columns: &[ColumnDef<T>], col_id: &str) -> f32 {
        let max = find_column(columns, col_id)
            .and_then(|col| col.max_width)
            .unwrap_or(DEFAULT_MAX_WIDTH);
        max.floor().max(self.min_width(columns, col_id))
    }

    fn clamp_width<T>(&self, columns: &[ColumnDef<T>], col_id: &str, width: f32) -> f32 {
        width
            .floor()
            .max(self.min_width(columns, col_id))
            .min(self.max_width(columns, col_id))
    }

    /// Current width of a column, clamped to its bounds.
    pub fn column_width<T>(&self, columns: &[ColumnDef<T>], col_id: &str) -> f32 {
        let width = self
            .state(col_id)
            .and_then(|st| st.width)
            .or_else(|| find_column(columns, col_id).and_then(|col| col.width))
            .unwrap_or(DEFAULT_COLUMN_WIDTH);
        self.clamp_width(columns, col_id, width)
    }

    /// Sets a column width, clamped. Returns `true` if the stored width changed.
    pub fn set_column_width<T>(&mut self, columns: &[ColumnDef<T>], col_id: &str, width: f32) -> bool {
        let clamped = self.clamp_width(columns, col_id, width);
        let state = self.ensure_state(columns, col_id);
        if state.width == Some(clamped) {
            return false;
        }
        state.width = Some(clamped);
        true
    }

    /// Pins a column to an edge, or unpins it with `None`.
    pub fn pin_column<T>(&mut self, columns: &[ColumnDef<T>], col_id: &str, side: Option<PinnedSide>) -> bool {
        let state = self.ensure_state(columns, col_id);
        if state.pinned == side {
            return false;
        }
        state.pinned = side;
        true
    }

    pub fn pinned_side(&self, col_id: &str) -> Option<PinnedSide> {
        self.state(col_id).and_then(|st| st.pinned)
    }

    /// Distance of a pinned column from its edge.
    ///
    /// Start-pinned columns accumulate widths left to right, end-pinned ones
    /// right to left. Unpinned columns report 0.
    pub fn pinned_offset<T>(&self, columns: &[ColumnDef<T>], col_id: &str) -> f32 {
        let Some(side) = self.pinned_side(col_id) else {
            return 0.0;
        };
        let pinned = self
            .order
            .iter()
            .filter(|id| self.pinned_side(id) == Some(side));
        let mut offset = 0.0;
        let ordered: Vec<&String> = match side {
            PinnedSide::Start => pinned.collect(),
            PinnedSide::End => pinned.rev().collect(),
        };
        for id in ordered {
            if id == col_id {
                return offset;
            }
            offset += self.column_width(columns, id);
        }
        0.0
    }

    fn ensure_state<T>(&mut self, columns: &[ColumnDef<T>], col_id: &str) -> &mut ColumnState {
        let index = match self.states.iter().position(|(id, _)| id == col_id) {
            Some(index) => index,
            None => {
                let col = find_column(columns, col_id);
                self.states.push((
                    col_id.to_string(),
                    ColumnState {
                        width: col.and_then(|c| c.width),
                        pinned: col.and_then(|c| c.pinned),
                    },
                ));
                self.states.len() - 1
            }
        };
        &mut self.states[index].1
    }
}
