//! # Nimbus Query
//!
//! Ordering of cross-partition ORDER BY results.
//!
//! Every partition returns a page already sorted by the server. This crate
//! supplies the [`OrderByComparator`] that puts rows from different
//! partitions into one strict total order, and [`OrderedMerge`], a k-way
//! merge driven by it.
//!
//! ```
//! use nimbus_query::{merge_pages, OrderByComparator, PartitionKeyRange, PartitionPage, SortSpec, SortValue};
//!
//! let cmp = OrderByComparator::new(SortSpec::ascending(1).unwrap());
//! let pages = vec![
//!     PartitionPage::new(PartitionKeyRange::new("1", "80", ""), vec![(vec![SortValue::from(2i64)], "c")]),
//!     PartitionPage::new(PartitionKeyRange::new("0", "", "80"), vec![(vec![SortValue::from(1i64)], "a")]),
//! ];
//! let merged = merge_pages(&cmp, pages, None).unwrap();
//! assert_eq!(merged[0].payload, "a");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod comparator;
mod error;
mod merge;
mod page;
mod sort;
mod value;

pub use comparator::OrderByComparator;
pub use error::{QueryError, QueryResult};
pub use merge::{merge_pages, OrderedMerge};
pub use page::{OrderedItem, PartitionKeyRange, PartitionPage};
pub use sort::{SortColumn, SortOrder, SortSpec};
pub use value::{ItemType, SortValue};
