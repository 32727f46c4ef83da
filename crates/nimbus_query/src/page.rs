//! Partition pages and the rows they carry.

use crate::value::{ItemType, SortValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A half-open range `[min_inclusive, max_exclusive)` of the partition key
/// space, served by one partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKeyRange {
    /// Range id.
    pub id: String,
    /// Lower bound, inclusive. Hex-encoded effective partition key.
    pub min_inclusive: String,
    /// Upper bound, exclusive.
    pub max_exclusive: String,
}

impl PartitionKeyRange {
    /// Creates a range.
    pub fn new(
        id: impl Into<String>,
        min_inclusive: impl Into<String>,
        max_exclusive: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            min_inclusive: min_inclusive.into(),
            max_exclusive: max_exclusive.into(),
        }
    }

    /// Returns true if `key` falls inside the range.
    pub fn contains(&self, key: &str) -> bool {
        key >= self.min_inclusive.as_str()
            && (self.max_exclusive.is_empty() || key < self.max_exclusive.as_str())
    }
}

/// One query result row with its sort values and owning partition.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedItem<T> {
    /// Values of the ORDER BY columns, in row order.
    pub sort_values: Vec<SortValue>,
    /// Partition that produced the row.
    pub range: Arc<PartitionKeyRange>,
    /// The row itself.
    pub payload: T,
}

impl<T> OrderedItem<T> {
    /// Creates a row.
    pub fn new(sort_values: Vec<SortValue>, range: Arc<PartitionKeyRange>, payload: T) -> Self {
        Self {
            sort_values,
            range,
            payload,
        }
    }

    /// Returns the type of every sort value.
    pub fn item_types(&self) -> Vec<ItemType> {
        self.sort_values.iter().map(SortValue::item_type).collect()
    }
}

/// One partition's contribution to a merge round, sorted ascending by the
/// server.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionPage<T> {
    /// Partition that produced the page.
    pub range: Arc<PartitionKeyRange>,
    /// Rows in server order.
    pub items: Vec<OrderedItem<T>>,
}

impl<T> PartitionPage<T> {
    /// Builds a page from `(sort_values, payload)` rows.
    pub fn new(
        range: PartitionKeyRange,
        rows: impl IntoIterator<Item = (Vec<SortValue>, T)>,
    ) -> Self {
        let range = Arc::new(range);
        let items = rows
            .into_iter()
            .map(|(sort_values, payload)| {
                OrderedItem::new(sort_values, Arc::clone(&range), payload)
            })
            .collect();
        Self { range, items }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the page has no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
