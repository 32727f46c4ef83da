//! Test fixtures: account topologies, a scripted cluster, canned pages.

use bytes::Bytes;
use nimbus_client::{ClientConfig, MockTransport, QueryPageBody, RequestExecutor};
use nimbus_routing::{AccountTopology, GlobalEndpointDirectory, RequestFailure};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Account-level endpoint every topology falls back to.
pub const GLOBAL_ENDPOINT: &str = "https://global.example";
/// East US regional endpoint.
pub const EAST_US: &str = "https://east.example";
/// West US regional endpoint.
pub const WEST_US: &str = "https://west.example";
/// North Europe regional endpoint.
pub const NORTH_EUROPE: &str = "https://north.example";

/// One write region (East US), two read regions.
pub fn single_write_topology() -> AccountTopology {
    AccountTopology::new()
        .with_write_location("East US", EAST_US)
        .with_read_location("East US", EAST_US)
        .with_read_location("West US", WEST_US)
}

/// Two regions, each readable and writable, single-master.
pub fn two_region_topology() -> AccountTopology {
    AccountTopology::new()
        .with_write_location("East US", EAST_US)
        .with_write_location("West US", WEST_US)
        .with_read_location("East US", EAST_US)
        .with_read_location("West US", WEST_US)
}

/// Three regions with multi-region writes enabled on the account.
pub fn multi_write_topology() -> AccountTopology {
    AccountTopology::new()
        .with_write_location("East US", EAST_US)
        .with_write_location("West US", WEST_US)
        .with_write_location("North Europe", NORTH_EUROPE)
        .with_read_location("East US", EAST_US)
        .with_read_location("West US", WEST_US)
        .with_read_location("North Europe", NORTH_EUROPE)
        .with_multiple_write_locations(true)
}

/// Executor type used by [`TestCluster`].
pub type TestExecutor = RequestExecutor<GlobalEndpointDirectory, MockTransport>;

/// A directory, a scripted transport and an executor wired together.
#[derive(Debug, Clone)]
pub struct TestCluster {
    /// The endpoint directory.
    pub directory: Arc<GlobalEndpointDirectory>,
    /// The scripted transport.
    pub transport: Arc<MockTransport>,
    /// The executor over both.
    pub executor: Arc<TestExecutor>,
}

impl TestCluster {
    /// Builds a cluster for `topology`.
    pub fn new(config: ClientConfig, topology: AccountTopology) -> Self {
        let directory = Arc::new(GlobalEndpointDirectory::new(
            GLOBAL_ENDPOINT,
            config.connection_policy.clone(),
            topology,
        ));
        let transport = Arc::new(MockTransport::new());
        let executor = Arc::new(RequestExecutor::new(
            Arc::clone(&directory),
            Arc::clone(&transport),
            config,
        ));
        Self {
            directory,
            transport,
            executor,
        }
    }

    /// Default configuration over [`two_region_topology`].
    pub fn two_region() -> Self {
        Self::new(ClientConfig::default(), two_region_topology())
    }

    /// Returns the endpoints contacted so far, in order.
    pub fn sent_endpoints(&self) -> Vec<String> {
        self.transport
            .sent()
            .iter()
            .map(|sent| sent.endpoint.to_string())
            .collect()
    }

    /// Answers query requests with the page registered for their
    /// `partitionKeyRangeId`. Unknown ranges get a 404.
    pub fn serve_query_pages(&self, pages: HashMap<String, QueryPageBody>) {
        let bodies: HashMap<String, Bytes> = pages
            .into_iter()
            .filter_map(|(id, page)| {
                serde_json::to_vec(&page)
                    .ok()
                    .map(|body| (id, Bytes::from(body)))
            })
            .collect();

        self.transport.set_handler(move |_endpoint, message| {
            let request: Value = serde_json::from_slice(&message.payload)
                .map_err(|err| RequestFailure::status(400, 0, err.to_string()))?;
            let range = request["partitionKeyRangeId"].as_str().unwrap_or_default();
            bodies
                .get(range)
                .cloned()
                .ok_or_else(|| RequestFailure::status(404, 0, format!("unknown range {range}")))
        });
    }
}

/// Canned query scenarios.
pub mod scenarios {
    use nimbus_client::{OrderByItem, OrderByRow, QueryPageBody};
    use nimbus_query::{PartitionKeyRange, PartitionPage, SortValue};
    use serde_json::json;
    use std::collections::HashMap;

    /// Splits the key space into `count` contiguous ranges with ids
    /// `"0"`, `"1"`, ...
    pub fn partition_ranges(count: usize) -> Vec<PartitionKeyRange> {
        let count = count.min(256);
        let bound = |i: usize| format!("{:02X}", i * 256 / count.max(1));
        (0..count)
            .map(|i| {
                let min = if i == 0 { String::new() } else { bound(i) };
                let max = if i + 1 == count {
                    "FF".to_string()
                } else {
                    bound(i + 1)
                };
                PartitionKeyRange::new(i.to_string(), min, max)
            })
            .collect()
    }

    /// Gives range `i` of `n` the keys `i, i + n, i + 2n, ...`, so the merged
    /// stream is `0, 1, 2, ...` with payload `"<range>-<row>"`.
    pub fn interleaved_pages(
        ranges: &[PartitionKeyRange],
        rows_per_page: usize,
    ) -> Vec<PartitionPage<String>> {
        let n = ranges.len();
        ranges
            .iter()
            .enumerate()
            .map(|(i, range)| {
                PartitionPage::new(
                    range.clone(),
                    (0..rows_per_page).map(|row| {
                        let key = (i + row * n) as i64;
                        (vec![SortValue::from(key)], format!("{}-{row}", range.id))
                    }),
                )
            })
            .collect()
    }

    /// The same layout as [`interleaved_pages`], as server response bodies
    /// keyed by range id.
    pub fn interleaved_bodies(
        ranges: &[PartitionKeyRange],
        rows_per_page: usize,
    ) -> HashMap<String, QueryPageBody> {
        interleaved_pages(ranges, rows_per_page)
            .into_iter()
            .map(|page| {
                let documents = page
                    .items
                    .iter()
                    .map(|item| OrderByRow {
                        order_by_items: item
                            .sort_values
                            .iter()
                            .map(|value| OrderByItem {
                                item: value.to_json(),
                            })
                            .collect(),
                        payload: json!({ "id": item.payload }),
                    })
                    .collect();
                (page.range.id.clone(), QueryPageBody { documents })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::scenarios::*;
    use super::*;
    use nimbus_client::{CrossPartitionQuery, ExecutorPageSource};
    use nimbus_query::{merge_pages, OrderByComparator, SortSpec};
    use nimbus_routing::EndpointDirectory;

    #[test]
    fn ranges_cover_the_key_space() {
        let ranges = partition_ranges(4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].min_inclusive, "");
        assert_eq!(ranges[1].min_inclusive, "40");
        assert_eq!(ranges[3].max_exclusive, "FF");
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].max_exclusive, pair[1].min_inclusive);
        }
        assert!(partition_ranges(0).is_empty());
    }

    #[test]
    fn interleaved_pages_merge_to_sequence() {
        let pages = interleaved_pages(&partition_ranges(3), 4);
        let comparator = OrderByComparator::new(SortSpec::ascending(1).unwrap());
        let merged = merge_pages(&comparator, pages, None).unwrap();

        let keys: Vec<_> = merged.iter().map(|item| item.sort_values[0].clone()).collect();
        let expected: Vec<_> = (0..12i64).map(nimbus_query::SortValue::from).collect();
        assert_eq!(keys, expected);
        assert_eq!(merged[0].payload, "0-0");
        assert_eq!(merged[4].payload, "1-1");
    }

    #[test]
    fn topologies() {
        let cluster = TestCluster::new(ClientConfig::default(), multi_write_topology());
        assert_eq!(cluster.directory.write_endpoints().len(), 3);

        let cluster = TestCluster::new(ClientConfig::default(), single_write_topology());
        assert_eq!(cluster.directory.write_endpoints().len(), 1);
        assert_eq!(cluster.directory.read_endpoints().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cluster_serves_query_pages() {
        let cluster = TestCluster::two_region();
        let ranges = partition_ranges(3);
        cluster.serve_query_pages(interleaved_bodies(&ranges, 2));

        let source = Arc::new(ExecutorPageSource::new(
            Arc::clone(&cluster.executor),
            "SELECT * FROM c ORDER BY c.n",
        ));
        let query = CrossPartitionQuery::new(source, ranges, SortSpec::ascending(1).unwrap());
        let merged = query.execute().await.unwrap();

        let ids: Vec<&str> = merged
            .iter()
            .map(|item| item.payload["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["0-0", "1-0", "2-0", "0-1", "1-1", "2-1"]);
        assert_eq!(cluster.sent_endpoints(), vec![EAST_US; 3]);
    }
}
