//! Value resolver.
//!
//! Resolves what a cell shows from a row and an effective column definition:
//! the raw value, the formatted value, the renderer output and the CSS class
//! list. Everything here is a pure read of its arguments.

use crate::column::{CellClass, ColumnDef};
use crate::value::{value_at_path, CellValue, RowData};

/// Arguments passed to value getters and formatters.
///
/// For getters `value` is the field's path value; for formatters it is the
/// cell's raw value.
pub struct ValueGetterParams<'a, T> {
    pub data: &'a T,
    pub col_def: &'a ColumnDef<T>,
    pub col_id: &'a str,
    pub value: CellValue,
    pub row_index: usize,
}

impl<T: RowData> ValueGetterParams<'_, T> {
    /// Dotted-path lookup on the current row.
    pub fn get_value(&self, path: &str) -> CellValue {
        value_at_path(self.data, path)
    }
}

/// Arguments passed to cell renderers and cell class functions.
pub struct CellRendererParams<'a, T> {
    pub data: &'a T,
    pub col_def: &'a ColumnDef<T>,
    pub col_id: &'a str,
    /// The raw value.
    pub value: CellValue,
    pub formatted_value: CellValue,
    pub row_index: usize,
    /// Whether the row is currently selected.
    pub selected: bool,
}

impl<T: RowData> CellRendererParams<'_, T> {
    /// Dotted-path lookup on the current row.
    pub fn get_value(&self, path: &str) -> CellValue {
        value_at_path(self.data, path)
    }
}

fn field_value<T: RowData>(row: &T, col: &ColumnDef<T>) -> CellValue {
    match col.field.as_deref() {
        Some(path) => value_at_path(row, path),
        None => CellValue::Null,
    }
}

/// The cell's raw value: the getter's result, else the field's path value.
pub fn raw_value<T: RowData>(row: &T, col: &ColumnDef<T>, row_index: usize) -> CellValue {
    let base = field_value(row, col);
    match &col.value_getter {
        Some(getter) => getter(&ValueGetterParams {
            data: row,
            col_def: col,
            col_id: col.id(),
            value: base,
            row_index,
        }),
        None => base,
    }
}

/// The formatter's result over the raw value, else the raw value.
pub fn formatted_value<T: RowData>(row: &T, col: &ColumnDef<T>, row_index: usize) -> CellValue {
    let raw = raw_value(row, col, row_index);
    format_raw(row, col, row_index, raw)
}

fn format_raw<T: RowData>(row: &T, col: &ColumnDef<T>, row_index: usize, raw: CellValue) -> CellValue {
    match &col.value_formatter {
        Some(formatter) => formatter(&ValueGetterParams {
            data: row,
            col_def: col,
            col_id: col.id(),
            value: raw,
            row_index,
        }),
        None => raw,
    }
}

fn renderer_params<'a, T: RowData>(
    row: &'a T,
    col: &'a ColumnDef<T>,
    row_index: usize,
    selected: bool,
) -> CellRendererParams<'a, T> {
    let raw = raw_value(row, col, row_index);
    let formatted = format_raw(row, col, row_index, raw.clone());
    CellRendererParams {
        data: row,
        col_def: col,
        col_id: col.id(),
        value: raw,
        formatted_value: formatted,
        row_index,
        selected,
    }
}

/// The renderer's output, or `None` when the column has no renderer.
pub fn render_output<T: RowData>(
    row: &T,
    col: &ColumnDef<T>,
    row_index: usize,
    selected: bool,
) -> Option<CellValue> {
    let renderer = col.cell_renderer.as_ref()?;
    Some(renderer(&renderer_params(row, col, row_index, selected)))
}

/// Alignment class first, then static or computed classes.
pub fn class_list<T: RowData>(row: &T, col: &ColumnDef<T>, row_index: usize, selected: bool) -> Vec<String> {
    let mut classes = Vec::new();
    if let Some(align) = col.align {
        classes.push(align.class_name().to_string());
    }
    match &col.cell_class {
        Some(CellClass::Static(list)) => classes.extend(list.iter().cloned()),
        Some(CellClass::Dynamic(f)) => {
            classes.extend(f(&renderer_params(row, col, row_index, selected)));
        }
        None => {}
    }
    classes.retain(|c| !c.is_empty());
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Align;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[test]
    fn test_raw_value_from_field() {
        let row = json!({"user": {"name": "Ada"}});
        let col = ColumnDef::<Value>::field("user.name");
        assert_eq!(raw_value(&row, &col, 0), CellValue::from("Ada"));
        assert_eq!(raw_value(&row, &ColumnDef::<Value>::default(), 0), CellValue::Null);
    }

    #[test]
    fn test_value_getter_receives_context() {
        let row = json!({"price": 10, "qty": 3});
        let col = ColumnDef::<Value>::with_id("total")
            .with_value_getter(|p| {
                let price = p.get_value("price").as_number().unwrap_or(0.0);
                let qty = p.get_value("qty").as_number().unwrap_or(0.0);
                assert_eq!(p.col_id, "total");
                assert!(p.value.is_null());
                CellValue::Float(price * qty + p.row_index as f64)
            });
        assert_eq!(raw_value(&row, &col, 2), CellValue::Float(32.0));
    }

    #[test]
    fn test_formatter_sees_raw_value() {
        let row = json!({"amount": 5});
        let col = ColumnDef::<Value>::field("amount")
            .with_value_formatter(|p| CellValue::Text(format!("${}", p.value)));
        assert_eq!(formatted_value(&row, &col, 0), CellValue::from("$5"));
        assert_eq!(raw_value(&row, &col, 0), CellValue::Int(5));
    }

    #[test]
    fn test_render_output() {
        let row = json!({"name": "x"});
        let plain = ColumnDef::<Value>::field("name");
        assert!(render_output(&row, &plain, 0, false).is_none());

        let col = ColumnDef::<Value>::field("name").with_cell_renderer(|p| {
            CellValue::Text(format!("{}:{}", p.formatted_value, p.selected))
        });
        assert_eq!(render_output(&row, &col, 0, true), Some(CellValue::from("x:true")));
    }

    #[test]
    fn test_class_list() {
        let row = json!({"n": -1});
        let none = ColumnDef::<Value>::field("n");
        assert!(class_list(&row, &none, 0, false).is_empty());

        let col = ColumnDef::<Value>::field("n")
            .with_align(Align::Right)
            .with_cell_class(CellClass::Dynamic(Arc::new(|p: &CellRendererParams<'_, Value>| {
                if p.value.as_number().unwrap_or(0.0) < 0.0 {
                    vec!["negative".to_string()]
                } else {
                    Vec::new()
                }
            })));
        assert_eq!(class_list(&row, &col, 0, false), vec!["align-right", "negative"]);

        let fixed = ColumnDef::<Value>::field("n").with_cell_class(CellClass::Static(vec!["mono".into()]));
        assert_eq!(class_list(&row, &fixed, 0, false), vec!["mono"]);
    }
}
