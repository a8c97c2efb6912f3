//! Cell values, row access and row identity.
//!
//! Rows are opaque application types. The grid only needs two things from
//! them: access to a named field (from which dotted paths such as
//! `"address.city"` are resolved) and, optionally, an `id` field for
//! identity. Both go through the [`RowData`] trait and produce [`CellValue`]s.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dynamically typed cell value.
///
/// `Null` stands for both a missing and an explicitly empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// No value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Ordered list of values.
    List(Vec<CellValue>),
    /// Nested record, reachable through dotted paths.
    Record(BTreeMap<String, CellValue>),
}

impl CellValue {
    /// Returns `true` for [`CellValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null, a zero-length string and a zero-length list count as empty.
    pub fn is_empty_value(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Numeric value of `Int` and `Float` variants.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Int(n) => Some(*n as f64),
            CellValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Like [`as_number`](Self::as_number), but also accepts numeric text.
    ///
    /// Filter values typed into a text box arrive as strings, so `"25"`
    /// compares numerically against a cell holding `25`.
    pub fn as_number_lenient(&self) -> Option<f64> {
        match self {
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            other => other.as_number(),
        }
    }

    /// Milliseconds since the Unix epoch, if the value can be read as a date.
    ///
    /// Numbers are taken as epoch milliseconds; text is parsed as RFC 3339 or
    /// one of the common ISO date/datetime layouts.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            CellValue::Date(dt) => Some(dt.timestamp_millis()),
            CellValue::Int(n) => Some(*n),
            CellValue::Float(n) if n.is_finite() => Some(*n as i64),
            CellValue::Text(s) => parse_datetime(s).map(|dt| dt.timestamp_millis()),
            _ => None,
        }
    }

    /// Text as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Loose string conversion used for text matching and display.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null | CellValue::Record(_) => Cow::Borrowed(""),
            CellValue::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            CellValue::Int(n) => Cow::Owned(n.to_string()),
            CellValue::Float(n) => Cow::Owned(format_float(*n)),
            CellValue::Text(s) => Cow::Borrowed(s),
            CellValue::Date(dt) => Cow::Owned(dt.to_rfc3339()),
            CellValue::List(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| item.to_text().into_owned())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    /// Child value for one path segment.
    ///
    /// Records are indexed by key, lists by a numeric segment.
    pub fn get(&self, segment: &str) -> Option<&CellValue> {
        match self {
            CellValue::Record(map) => map.get(segment),
            CellValue::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Strict equality: numbers compare by value across `Int`/`Float`,
    /// everything else structurally. No case folding.
    pub fn strict_eq(&self, other: &CellValue) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

/// Parses an ISO-style date/datetime string; tries each layout in order.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Int(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Int(n as i64)
    }
}

impl From<u32> for CellValue {
    fn from(n: u32) -> Self {
        CellValue::Int(n as i64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Float(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(dt: DateTime<Utc>) -> Self {
        CellValue::Date(dt)
    }
}

impl<V: Into<CellValue>> From<Vec<V>> for CellValue {
    fn from(items: Vec<V>) -> Self {
        CellValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<CellValue>> From<Option<V>> for CellValue {
    fn from(opt: Option<V>) -> Self {
        opt.map(Into::into).unwrap_or_default()
    }
}

impl From<&serde_json::Value> for CellValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => CellValue::Int(i),
                None => n.as_f64().map(CellValue::Float).unwrap_or_default(),
            },
            Value::String(s) => CellValue::Text(s.clone()),
            Value::Array(items) => CellValue::List(items.iter().map(CellValue::from).collect()),
            Value::Object(map) => CellValue::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), CellValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(value: serde_json::Value) -> Self {
        CellValue::from(&value)
    }
}

/// Field access on an application row type.
///
/// Implement [`field`](RowData::field) to resolve a single path segment;
/// dotted paths are handled by [`value_at_path`].
///
/// # Example
///
/// ```
/// use gridline::{CellValue, RowData};
///
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// impl RowData for Person {
///     fn field(&self, name: &str) -> CellValue {
///         match name {
///             "id" => self.id.into(),
///             "name" => self.name.as_str().into(),
///             _ => CellValue::Null,
///         }
///     }
/// }
/// ```
pub trait RowData {
    /// Value of a top-level field, or `Null` if the row has no such field.
    fn field(&self, name: &str) -> CellValue;
}

impl RowData for serde_json::Value {
    fn field(&self, name: &str) -> CellValue {
        match self {
            serde_json::Value::Object(map) => map.get(name).map(CellValue::from).unwrap_or_default(),
            serde_json::Value::Array(items) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .map(CellValue::from)
                .unwrap_or_default(),
            _ => CellValue::Null,
        }
    }
}

impl RowData for CellValue {
    fn field(&self, name: &str) -> CellValue {
        self.get(name).cloned().unwrap_or_default()
    }
}

impl RowData for BTreeMap<String, CellValue> {
    fn field(&self, name: &str) -> CellValue {
        self.get(name).cloned().unwrap_or_default()
    }
}

impl RowData for HashMap<String, CellValue> {
    fn field(&self, name: &str) -> CellValue {
        self.get(name).cloned().unwrap_or_default()
    }
}

/// Resolves a dotted path (`"a.b.c"`) against a row.
///
/// Segments are applied left to right; a null or missing intermediate
/// yields `Null` instead of failing. An empty path yields `Null`.
pub fn value_at_path<R: RowData + ?Sized>(row: &R, path: &str) -> CellValue {
    if path.is_empty() {
        return CellValue::Null;
    }
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return CellValue::Null;
    };
    let mut current = row.field(first);
    for segment in segments {
        if current.is_null() {
            return CellValue::Null;
        }
        current = current.get(segment).cloned().unwrap_or_default();
    }
    current
}

/// Stable identity of a row within the current data set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    /// Numeric identity (also used for positional fallback).
    Int(i64),
    /// Textual identity.
    Text(String),
}

impl RowId {
    /// Reads an identity from a cell value.
    ///
    /// Integral numbers and text qualify; anything else does not.
    pub fn from_value(value: &CellValue) -> Option<Self> {
        match value {
            CellValue::Int(n) => Some(RowId::Int(*n)),
            CellValue::Float(n) if n.is_finite() && n.fract() == 0.0 => Some(RowId::Int(*n as i64)),
            CellValue::Text(s) => Some(RowId::Text(s.clone())),
            _ => None,
        }
    }

    /// Positional identity for rows without an id.
    pub fn index(index: usize) -> Self {
        RowId::Int(index as i64)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(n) => write!(f, "{n}"),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowId {
    fn from(n: i64) -> Self {
        RowId::Int(n)
    }
}

impl From<i32> for RowId {
    fn from(n: i32) -> Self {
        RowId::Int(n as i64)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId::Text(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dotted_path_lookup() {
        let row = json!({"a": {"b": {"c": 42}}, "list": [10, 20]});
        assert_eq!(value_at_path(&row, "a.b.c"), CellValue::Int(42));
        assert_eq!(value_at_path(&row, "list.1"), CellValue::Int(20));
        assert_eq!(value_at_path(&row, "a.missing.c"), CellValue::Null);
        assert_eq!(value_at_path(&row, ""), CellValue::Null);
    }

    #[test]
    fn test_path_through_null_short_circuits() {
        let row = json!({"a": null});
        assert_eq!(value_at_path(&row, "a.b.c"), CellValue::Null);
    }

    #[test]
    fn test_empty_values() {
        assert!(CellValue::Null.is_empty_value());
        assert!(CellValue::from("").is_empty_value());
        assert!(CellValue::List(vec![]).is_empty_value());
        assert!(!CellValue::from(" ").is_empty_value());
        assert!(!CellValue::Int(0).is_empty_value());
    }

    #[test]
    fn test_to_text() {
        assert_eq!(CellValue::Float(30.0).to_text(), "30");
        assert_eq!(CellValue::Float(2.5).to_text(), "2.5");
        assert_eq!(CellValue::Null.to_text(), "");
        assert_eq!(CellValue::from(vec![1, 2]).to_text(), "1,2");
        assert_eq!(CellValue::Bool(true).to_text(), "true");
    }

    #[test]
    fn test_timestamps() {
        let a = CellValue::from("2024-01-15").as_timestamp().unwrap();
        let b = CellValue::from("2024-01-15T00:00:00Z").as_timestamp().unwrap();
        assert_eq!(a, b);
        assert!(CellValue::from("not a date").as_timestamp().is_none());
        assert!(CellValue::Bool(true).as_timestamp().is_none());
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(CellValue::from(" 25 ").as_number_lenient(), Some(25.0));
        assert_eq!(CellValue::from("abc").as_number_lenient(), None);
        assert_eq!(CellValue::from("").as_number_lenient(), None);
        assert_eq!(CellValue::from("25").as_number(), None);
    }

    #[test]
    fn test_strict_eq() {
        assert!(CellValue::Int(1).strict_eq(&CellValue::Float(1.0)));
        assert!(!CellValue::from("a").strict_eq(&CellValue::from("A")));
        assert!(!CellValue::from("1").strict_eq(&CellValue::Int(1)));
    }

    #[test]
    fn test_row_id_from_value() {
        assert_eq!(RowId::from_value(&CellValue::Int(3)), Some(RowId::Int(3)));
        assert_eq!(RowId::from_value(&CellValue::Float(3.0)), Some(RowId::Int(3)));
        assert_eq!(RowId::from_value(&"x".into()), Some(RowId::Text("x".into())));
        assert_eq!(RowId::from_value(&CellValue::Null), None);
    }

    #[test]
    fn test_json_conversion() {
        let value = CellValue::from(json!({"n": 1.5, "tags": ["a"]}));
        assert_eq!(value.get("n"), Some(&CellValue::Float(1.5)));
        assert_eq!(value.field("tags"), CellValue::List(vec!["a".into()]));
    }
}
