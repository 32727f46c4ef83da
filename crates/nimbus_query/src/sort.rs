//! Sort specifications.

use crate::error::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of one sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(QueryError::InvalidSortSpec(format!(
                "unknown sort order '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => f.write_str("asc"),
            SortOrder::Descending => f.write_str("desc"),
        }
    }
}

/// One `(column, direction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortColumn {
    /// Position of the value in each row's sort values.
    pub index: usize,
    /// Direction.
    pub order: SortOrder,
}

/// The ORDER BY of one query. Fixed for the query's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    columns: Vec<SortColumn>,
}

impl SortSpec {
    /// Creates a sort specification.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSortSpec` if `columns` is empty, or if the column
    /// indices are not each in `0..columns.len()` exactly once.
    pub fn new(columns: Vec<SortColumn>) -> QueryResult<Self> {
        if columns.is_empty() {
            return Err(QueryError::InvalidSortSpec(
                "at least one sort column is required".to_string(),
            ));
        }

        let mut seen = vec![false; columns.len()];
        for column in &columns {
            match seen.get_mut(column.index) {
                None => {
                    return Err(QueryError::InvalidSortSpec(format!(
                        "column index {} out of range for {} columns",
                        column.index,
                        columns.len()
                    )))
                }
                Some(true) => {
                    return Err(QueryError::InvalidSortSpec(format!(
                        "column index {} listed twice",
                        column.index
                    )))
                }
                Some(slot) => *slot = true,
            }
        }

        Ok(Self { columns })
    }

    /// Orders by `n` columns, all ascending, in row order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSortSpec` if `n` is zero.
    pub fn ascending(n: usize) -> QueryResult<Self> {
        Self::from_orders(std::iter::repeat(SortOrder::Ascending).take(n))
    }

    /// Orders by one column per direction, in row order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSortSpec` if `orders` is empty.
    pub fn from_orders(orders: impl IntoIterator<Item = SortOrder>) -> QueryResult<Self> {
        Self::new(
            orders
                .into_iter()
                .enumerate()
                .map(|(index, order)| SortColumn { index, order })
                .collect(),
        )
    }

    /// Returns the columns in comparison order.
    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    /// Returns the number of sort columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; a spec has at least one column.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
