//! k-way merge of sorted partition pages.

use crate::comparator::OrderByComparator;
use crate::error::QueryResult;
use crate::page::{OrderedItem, PartitionPage};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::debug;

/// Iterator that merges sorted partition pages into one sorted stream.
///
/// Each step picks the smallest head among the pages using the shared
/// [`OrderByComparator`]. If a comparison fails, the error is yielded once
/// and the iterator is finished; it never stalls without a terminal item.
///
/// The output order depends only on the comparator, not on the order in
/// which pages were handed in.
///
/// Each step scans every non-empty page head, so yielding a row costs
/// `k - 1` comparisons for `k` pages. A heap is not used because
/// [`OrderByComparator::compare`] can fail, which `Ord` cannot express, and
/// the scan always passes the earlier page's head as the left operand.
#[derive(Debug)]
pub struct OrderedMerge<'c, T> {
    comparator: &'c OrderByComparator,
    heads: Vec<VecDeque<OrderedItem<T>>>,
    remaining: Option<usize>,
    finished: bool,
}

impl<'c, T> OrderedMerge<'c, T> {
    /// Creates a merge over `pages`.
    pub fn new(
        comparator: &'c OrderByComparator,
        pages: impl IntoIterator<Item = PartitionPage<T>>,
    ) -> Self {
        let heads: Vec<VecDeque<OrderedItem<T>>> = pages
            .into_iter()
            .filter(|page| !page.is_empty())
            .map(|page| page.items.into())
            .collect();
        debug!(pages = heads.len(), "starting ordered merge");
        Self {
            comparator,
            heads,
            remaining: None,
            finished: false,
        }
    }

    /// Stops after `limit` rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.remaining = Some(limit);
        self
    }

    /// Returns the position of the page holding the smallest head.
    ///
    /// Linear in the number of pages.
    fn min_head(&self) -> QueryResult<Option<usize>> {
        let mut best: Option<usize> = None;
        for (i, page) in self.heads.iter().enumerate() {
            let Some(candidate) = page.front() else {
                continue;
            };
            match best {
                None => best = Some(i),
                Some(b) => {
                    if let Some(current) = self.heads[b].front() {
                        if self.comparator.compare(current, candidate)? == Ordering::Greater {
                            best = Some(i);
                        }
                    }
                }
            }
        }
        Ok(best)
    }
}

impl<T> Iterator for OrderedMerge<'_, T> {
    type Item = QueryResult<OrderedItem<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.remaining == Some(0) {
            return None;
        }

        match self.min_head() {
            Ok(Some(i)) => {
                let item = self.heads[i].pop_front()?;
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                Some(Ok(item))
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Merges `pages` into one sorted vector, stopping after `limit` rows if
/// given.
///
/// # Errors
///
/// Returns the first comparator error.
pub fn merge_pages<T>(
    comparator: &OrderByComparator,
    pages: impl IntoIterator<Item = PartitionPage<T>>,
    limit: Option<usize>,
) -> QueryResult<Vec<OrderedItem<T>>> {
    let merge = OrderedMerge::new(comparator, pages);
    match limit {
        Some(limit) => merge.with_limit(limit).collect(),
        None => merge.collect(),
    }
}
