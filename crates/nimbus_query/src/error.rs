//! Error types for ordered merging.

use crate::value::ItemType;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while ordering cross-partition results.
///
/// None of these are transient: they mean the query plan and the data
/// disagree, and retrying cannot help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A row carries a different number of sort values than the query
    /// orders by.
    #[error("row has {actual} sort values, expected {expected}")]
    CardinalityMismatch {
        /// Number of sort columns in the query.
        expected: usize,
        /// Number of sort values in the row.
        actual: usize,
    },

    /// A sort column changed type between rows.
    #[error("sort column {column} has type {actual}, expected {expected}")]
    TypeMismatch {
        /// Position of the column in the row.
        column: usize,
        /// Type established by the first row compared.
        expected: ItemType,
        /// Type found.
        actual: ItemType,
    },

    /// The sort specification is malformed.
    #[error("invalid sort specification: {0}")]
    InvalidSortSpec(String),
}

impl QueryError {
    /// Returns true if this is a plan/data inconsistency rather than a
    /// caller mistake.
    pub fn is_data_inconsistency(&self) -> bool {
        matches!(
            self,
            QueryError::CardinalityMismatch { .. } | QueryError::TypeMismatch { .. }
        )
    }

    /// Returns true if the query cannot continue. Always true.
    pub fn is_fatal(&self) -> bool {
        true
    }
}
