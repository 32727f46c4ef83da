//! Merge command implementation.
//!
//! Input is a JSON array of pages:
//!
//! ```json
//! [
//!   {
//!     "range": {"id": "0", "min_inclusive": "", "max_exclusive": "80"},
//!     "Documents": [{"orderByItems": [{"item": 1}], "payload": {"id": "a"}}]
//!   }
//! ]
//! ```

use nimbus_client::QueryPageBody;
use nimbus_query::{merge_pages, OrderByComparator, PartitionKeyRange, SortOrder, SortSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PageFile {
    range: PartitionKeyRange,
    #[serde(flatten)]
    body: QueryPageBody,
}

/// One row of merged output.
#[derive(Debug, Serialize)]
pub struct MergedRow {
    /// Id of the partition range the row came from.
    pub range: String,
    /// Sort values.
    pub order_by: Vec<Value>,
    /// The document.
    pub payload: Value,
}

/// Parses `asc,desc,...` into a sort specification.
fn parse_orders(orders: &str) -> Result<SortSpec, Box<dyn std::error::Error>> {
    let orders = orders
        .split(',')
        .map(str::parse)
        .collect::<Result<Vec<SortOrder>, _>>()?;
    Ok(SortSpec::from_orders(orders)?)
}

/// Reads pages from `path` and merges them.
///
/// Without `orders`, every column sorts ascending and the column count is
/// taken from the first row found.
pub fn merge_file(
    path: &Path,
    orders: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<MergedRow>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let files: Vec<PageFile> = serde_json::from_str(&text)?;
    let pages: Vec<_> = files
        .into_iter()
        .map(|file| file.body.into_page(file.range))
        .collect();

    let spec = match orders {
        Some(orders) => parse_orders(orders)?,
        None => {
            let columns = pages
                .iter()
                .flat_map(|page| page.items.first())
                .map(|item| item.sort_values.len())
                .next()
                .unwrap_or(1);
            SortSpec::ascending(columns)?
        }
    };
    debug!(pages = pages.len(), columns = spec.len(), ?limit, "merging pages");

    let comparator = OrderByComparator::new(spec);
    let merged = merge_pages(&comparator, pages, limit)?;

    Ok(merged
        .into_iter()
        .map(|item| MergedRow {
            range: item.range.id.clone(),
            order_by: item.sort_values.iter().map(|value| value.to_json()).collect(),
            payload: item.payload,
        })
        .collect())
}

/// Runs the merge command.
pub fn run(
    path: &Path,
    orders: Option<&str>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = merge_file(path, orders, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            println!("{:<8} {:<24} PAYLOAD", "RANGE", "ORDER BY");
            for row in &rows {
                let order_by = row
                    .order_by
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{:<8} {:<24} {}", row.range, order_by, row.payload);
            }
            println!();
            println!("{} rows", rows.len());
        }
    }

    Ok(())
}
