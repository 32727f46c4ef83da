//! The ORDER BY comparator used to merge partition results.

use crate::error::{QueryError, QueryResult};
use crate::page::OrderedItem;
use crate::sort::{SortOrder, SortSpec};
use crate::value::ItemType;
use std::cmp::Ordering;
use std::sync::OnceLock;
use tracing::error;

/// Total order over rows coming from different partitions.
///
/// The comparator is shared by every comparison of one query's merge. The
/// first row it ever sees fixes the type of each sort column; every later
/// row must match, otherwise the comparison fails with
/// [`QueryError::TypeMismatch`]. Rows whose sort values compare equal are
/// ordered by the lower bound of their partition range.
///
/// Errors are never absorbed. A merge driver must stop and surface the first
/// error it gets from [`compare`](Self::compare).
#[derive(Debug)]
pub struct OrderByComparator {
    sort_spec: SortSpec,
    item_types: OnceLock<Vec<ItemType>>,
}

impl OrderByComparator {
    /// Creates a comparator for one query.
    pub fn new(sort_spec: SortSpec) -> Self {
        Self {
            sort_spec,
            item_types: OnceLock::new(),
        }
    }

    /// Returns the sort specification.
    pub fn sort_spec(&self) -> &SortSpec {
        &self.sort_spec
    }

    /// Returns the column types, once the first comparison has fixed them.
    pub fn item_types(&self) -> Option<&[ItemType]> {
        self.item_types.get().map(Vec::as_slice)
    }

    /// Compares two rows.
    ///
    /// # Errors
    ///
    /// - `CardinalityMismatch` if either row has the wrong number of sort
    ///   values
    /// - `TypeMismatch` if either row's column types differ from the first
    ///   row's
    pub fn compare<T>(&self, a: &OrderedItem<T>, b: &OrderedItem<T>) -> QueryResult<Ordering> {
        self.compare_inner(a, b).inspect_err(|err| {
            error!(
                error = %err,
                left = ?a.sort_values,
                left_range = %a.range.id,
                right = ?b.sort_values,
                right_range = %b.range.id,
                "order by comparison failed"
            );
        })
    }

    fn compare_inner<T>(&self, a: &OrderedItem<T>, b: &OrderedItem<T>) -> QueryResult<Ordering> {
        let expected = self.sort_spec.len();
        for item in [a, b] {
            if item.sort_values.len() != expected {
                return Err(QueryError::CardinalityMismatch {
                    expected,
                    actual: item.sort_values.len(),
                });
            }
        }

        let types = self.item_types.get_or_init(|| a.item_types());
        check_types(types, a)?;
        check_types(types, b)?;

        for column in self.sort_spec.columns() {
            let ord = a.sort_values[column.index].cmp_canonical(&b.sort_values[column.index]);
            if ord != Ordering::Equal {
                return Ok(match column.order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                });
            }
        }

        Ok(a.range.min_inclusive.cmp(&b.range.min_inclusive))
    }
}

fn check_types<T>(expected: &[ItemType], item: &OrderedItem<T>) -> QueryResult<()> {
    for (column, (want, value)) in expected.iter().zip(&item.sort_values).enumerate() {
        let actual = value.item_type();
        if actual != *want {
            return Err(QueryError::TypeMismatch {
                column,
                expected: *want,
                actual,
            });
        }
    }
    Ok(())
}
