//! Sort column values and their type classification.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Runtime type of a sort column value.
///
/// Variants are declared in cross-type precedence order, so the derived
/// `Ord` is the precedence used when values of different types meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemType {
    /// JSON null (or an undefined column).
    Null,
    /// true / false.
    Bool,
    /// Any JSON number.
    Number,
    /// UTF-8 string.
    String,
    /// Array.
    Array,
    /// Object.
    Object,
}

impl ItemType {
    /// Returns the lowercase type name.
    pub fn name(self) -> &'static str {
        match self {
            ItemType::Null => "null",
            ItemType::Bool => "boolean",
            ItemType::Number => "number",
            ItemType::String => "string",
            ItemType::Array => "array",
            ItemType::Object => "object",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One sort column value of a query result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number. JSON integers are widened to `f64`.
    Number(f64),
    /// String.
    String(String),
    /// Array.
    Array(Vec<SortValue>),
    /// Object with keys in sorted order.
    Object(BTreeMap<String, SortValue>),
}

impl SortValue {
    /// Returns the value's type classification.
    pub fn item_type(&self) -> ItemType {
        match self {
            SortValue::Null => ItemType::Null,
            SortValue::Bool(_) => ItemType::Bool,
            SortValue::Number(_) => ItemType::Number,
            SortValue::String(_) => ItemType::String,
            SortValue::Array(_) => ItemType::Array,
            SortValue::Object(_) => ItemType::Object,
        }
    }

    /// Compares two values in canonical order: by type precedence first,
    /// then natively within a type.
    ///
    /// Strings compare by code point, arrays and objects element-wise.
    pub fn cmp_canonical(&self, other: &Self) -> Ordering {
        let self_type = self.item_type();
        let other_type = other.item_type();

        if self_type != other_type {
            return self_type.cmp(&other_type);
        }

        match (self, other) {
            (SortValue::Null, SortValue::Null) => Ordering::Equal,
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::String(a), SortValue::String(b)) => a.cmp(b),
            (SortValue::Array(a), SortValue::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.cmp_canonical(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (SortValue::Object(a), SortValue::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.cmp_canonical(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        }
    }

    /// Converts back to JSON. Non-finite numbers become null.
    pub fn to_json(&self) -> Value {
        match self {
            SortValue::Null => Value::Null,
            SortValue::Bool(b) => Value::Bool(*b),
            SortValue::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
            SortValue::String(s) => Value::String(s.clone()),
            SortValue::Array(items) => Value::Array(items.iter().map(SortValue::to_json).collect()),
            SortValue::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<Value> for SortValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SortValue::Null,
            Value::Bool(b) => SortValue::Bool(b),
            Value::Number(n) => n.as_f64().map_or(SortValue::Null, SortValue::Number),
            Value::String(s) => SortValue::String(s),
            Value::Array(items) => SortValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(fields) => SortValue::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, SortValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&SortValue> for Value {
    fn from(value: &SortValue) -> Self {
        value.to_json()
    }
}

impl From<bool> for SortValue {
    fn from(b: bool) -> Self {
        SortValue::Bool(b)
    }
}

impl From<f64> for SortValue {
    fn from(n: f64) -> Self {
        SortValue::Number(n)
    }
}

impl From<i64> for SortValue {
    fn from(n: i64) -> Self {
        SortValue::Number(n as f64)
    }
}

impl From<&str> for SortValue {
    fn from(s: &str) -> Self {
        SortValue::String(s.to_string())
    }
}

impl From<String> for SortValue {
    fn from(s: String) -> Self {
        SortValue::String(s)
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
