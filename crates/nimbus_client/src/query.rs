//! Cross-partition ordered queries.

use crate::error::{ClientError, ClientResult};
use crate::executor::{CancellationFlag, RequestExecutor};
use crate::transport::Transport;
use nimbus_codec::{OperationType, ResourceType};
use nimbus_query::{
    merge_pages, OrderByComparator, OrderedItem, PartitionKeyRange, PartitionPage, SortSpec,
    SortValue,
};
use nimbus_routing::{EndpointDirectory, ServiceRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

/// Produces one partition's page of an ORDER BY query.
pub trait PageSource: Send + Sync + 'static {
    /// Row payload type.
    type Item: Send + 'static;

    /// Fetches the page for `range`, sorted by the server.
    fn fetch_page(
        &self,
        range: PartitionKeyRange,
    ) -> impl Future<Output = ClientResult<PartitionPage<Self::Item>>> + Send;
}

/// An ORDER BY query fanned out over partitions and merged client-side.
#[derive(Debug)]
pub struct CrossPartitionQuery<S: PageSource> {
    source: Arc<S>,
    ranges: Vec<PartitionKeyRange>,
    comparator: OrderByComparator,
    limit: Option<usize>,
}

impl<S: PageSource> CrossPartitionQuery<S> {
    /// Creates a query over `ranges`.
    pub fn new(source: Arc<S>, ranges: Vec<PartitionKeyRange>, sort_spec: SortSpec) -> Self {
        Self {
            source,
            ranges,
            comparator: OrderByComparator::new(sort_spec),
            limit: None,
        }
    }

    /// Keeps only the first `limit` rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the comparator driving the merge.
    pub fn comparator(&self) -> &OrderByComparator {
        &self.comparator
    }

    /// Fetches every partition's page concurrently, then merges them.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error, in completion order, or the first
    /// comparator error. Outstanding fetches are aborted on error.
    pub async fn execute(&self) -> ClientResult<Vec<OrderedItem<S::Item>>> {
        let mut tasks = JoinSet::new();
        for range in self.ranges.iter().cloned() {
            let source = Arc::clone(&self.source);
            tasks.spawn(async move { source.fetch_page(range).await });
        }

        let mut pages = Vec::with_capacity(self.ranges.len());
        while let Some(joined) = tasks.join_next().await {
            let page = joined.map_err(|err| ClientError::TaskFailed(err.to_string()))??;
            debug!(range = %page.range.id, rows = page.len(), "partition page arrived");
            pages.push(page);
        }

        Ok(merge_pages(&self.comparator, pages, self.limit)?)
    }
}

/// One ORDER BY sort value as the server returns it. A missing `item`
/// means the column is undefined for the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByItem {
    /// The value.
    #[serde(default)]
    pub item: Value,
}

/// One row of an ORDER BY response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByRow {
    /// Sort values, in ORDER BY order.
    #[serde(rename = "orderByItems")]
    pub order_by_items: Vec<OrderByItem>,
    /// The document.
    #[serde(default)]
    pub payload: Value,
}

/// The body of an ORDER BY response page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryPageBody {
    /// Rows in server order.
    #[serde(rename = "Documents", default)]
    pub documents: Vec<OrderByRow>,
}

impl QueryPageBody {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the body is not a valid page.
    pub fn parse(body: &[u8]) -> ClientResult<Self> {
        serde_json::from_slice(body).map_err(|err| ClientError::InvalidResponse(err.to_string()))
    }

    /// Converts the rows into a partition page.
    pub fn into_page(self, range: PartitionKeyRange) -> PartitionPage<Value> {
        PartitionPage::new(
            range,
            self.documents.into_iter().map(|row| {
                let values = row
                    .order_by_items
                    .into_iter()
                    .map(|item| SortValue::from(item.item))
                    .collect();
                (values, row.payload)
            }),
        )
    }
}

/// Fetches partition pages by running query requests through an executor.
#[derive(Debug)]
pub struct ExecutorPageSource<D: EndpointDirectory, T: Transport> {
    executor: Arc<RequestExecutor<D, T>>,
    query: String,
    cancel: CancellationFlag,
}

impl<D: EndpointDirectory, T: Transport> ExecutorPageSource<D, T> {
    /// Creates a page source for `query`.
    pub fn new(executor: Arc<RequestExecutor<D, T>>, query: impl Into<String>) -> Self {
        Self {
            executor,
            query: query.into(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Uses `cancel` for every page request.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the request body sent for `range`.
    pub fn request_body(&self, range: &PartitionKeyRange) -> Vec<u8> {
        json!({
            "query": self.query,
            "partitionKeyRangeId": range.id,
        })
        .to_string()
        .into_bytes()
    }
}

impl<D: EndpointDirectory, T: Transport> PageSource for ExecutorPageSource<D, T> {
    type Item = Value;

    async fn fetch_page(&self, range: PartitionKeyRange) -> ClientResult<PartitionPage<Value>> {
        let request = ServiceRequest::new(OperationType::Query, ResourceType::Document);
        let body = self.request_body(&range);
        let response = self.executor.execute(request, &body, &self.cancel).await?;
        Ok(QueryPageBody::parse(&response.body)?.into_page(range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_query::{QueryError, SortOrder};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves canned pages, each after its own delay.
    struct StaticSource {
        pages: Mutex<HashMap<String, (Duration, Vec<(Vec<SortValue>, &'static str)>)>>,
    }

    impl StaticSource {
        fn new(pages: Vec<(&str, u64, Vec<(Vec<SortValue>, &'static str)>)>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .map(|(id, delay, rows)| {
                            (id.to_string(), (Duration::from_millis(delay), rows))
                        })
                        .collect(),
                ),
            }
        }
    }

    impl PageSource for StaticSource {
        type Item = &'static str;

        async fn fetch_page(
            &self,
            range: PartitionKeyRange,
        ) -> ClientResult<PartitionPage<&'static str>> {
            let entry = self.pages.lock().remove(&range.id);
            let Some((delay, rows)) = entry else {
                return Err(ClientError::InvalidResponse(format!("no page for {}", range.id)));
            };
            tokio::time::sleep(delay).await;
            Ok(PartitionPage::new(range, rows))
        }
    }

    fn ranges() -> Vec<PartitionKeyRange> {
        vec![
            PartitionKeyRange::new("0", "", "55"),
            PartitionKeyRange::new("1", "55", "AA"),
            PartitionKeyRange::new("2", "AA", "FF"),
        ]
    }

    fn row(key: i64, payload: &'static str) -> (Vec<SortValue>, &'static str) {
        (vec![SortValue::from(key)], payload)
    }

    #[tokio::test(start_paused = true)]
    async fn merge_is_independent_of_arrival_order() {
        // Partition 2 answers first, partition 0 last.
        let source = Arc::new(StaticSource::new(vec![
            ("0", 30, vec![row(1, "a")]),
            ("1", 20, vec![row(1, "b")]),
            ("2", 10, vec![row(2, "c")]),
        ]));
        let query = CrossPartitionQuery::new(source, ranges(), SortSpec::ascending(1).unwrap());

        let merged = query.execute().await.unwrap();
        let payloads: Vec<&str> = merged.iter().map(|item| item.payload).collect();
        assert_eq!(payloads, vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_applies_after_merge() {
        let source = Arc::new(StaticSource::new(vec![
            ("0", 0, vec![row(9, "i"), row(5, "e")]),
            ("1", 0, vec![row(7, "g"), row(2, "b")]),
            ("2", 0, vec![row(3, "c")]),
        ]));
        let query = CrossPartitionQuery::new(
            source,
            ranges(),
            SortSpec::from_orders([SortOrder::Descending]).unwrap(),
        )
        .with_limit(2);

        let merged = query.execute().await.unwrap();
        let payloads: Vec<&str> = merged.iter().map(|item| item.payload).collect();
        assert_eq!(payloads, vec!["i", "g"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_returned() {
        let source = Arc::new(StaticSource::new(vec![
            ("0", 0, vec![row(1, "a")]),
            ("2", 0, vec![row(2, "c")]),
        ]));
        let query = CrossPartitionQuery::new(source, ranges(), SortSpec::ascending(1).unwrap());

        let err = query.execute().await.unwrap_err();
        assert_eq!(err, ClientError::InvalidResponse("no page for 1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn comparator_error_is_returned() {
        let source = Arc::new(StaticSource::new(vec![
            ("0", 0, vec![row(1, "a")]),
            ("1", 5, vec![(vec![SortValue::from("x")], "b")]),
            ("2", 10, vec![]),
        ]));
        let query = CrossPartitionQuery::new(source, ranges(), SortSpec::ascending(1).unwrap());

        let err = query.execute().await.unwrap_err();
        assert!(matches!(err, ClientError::Query(QueryError::TypeMismatch { .. })));
    }

    #[test]
    fn parse_query_page() {
        let body = br#"{
            "Documents": [
                {"orderByItems": [{"item": 1}, {}], "payload": {"id": "x"}},
                {"orderByItems": [{"item": "two"}, {"item": true}], "payload": {"id": "y"}}
            ]
        }"#;
        let page = QueryPageBody::parse(body)
            .unwrap()
            .into_page(PartitionKeyRange::new("0", "", "FF"));

        assert_eq!(page.len(), 2);
        assert_eq!(
            page.items[0].sort_values,
            vec![SortValue::Number(1.0), SortValue::Null]
        );
        assert_eq!(page.items[1].payload, json!({"id": "y"}));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            QueryPageBody::parse(b"not json"),
            Err(ClientError::InvalidResponse(_))
        ));
    }
}
