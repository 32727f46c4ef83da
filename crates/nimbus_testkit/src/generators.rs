//! Property-based test generators using proptest.
//!
//! Row generators keep every sort column on a single type per query, the
//! way a well-formed ORDER BY result does.

use nimbus_codec::{OperationType, RequestFrame, ResourceType};
use nimbus_query::{
    ItemType, OrderByComparator, OrderedItem, PartitionKeyRange, PartitionPage, SortSpec,
    SortOrder, SortValue,
};
use proptest::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Strategy for activity ids.
pub fn activity_id_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Strategy for operation types that have a wire id.
pub fn framed_operation_strategy() -> impl Strategy<Value = OperationType> {
    prop::sample::select(OperationType::ALL).prop_filter("operation has no wire id", |op| {
        op.to_wire().is_ok()
    })
}

/// Strategy for resource types that have a wire id.
pub fn framed_resource_strategy() -> impl Strategy<Value = ResourceType> {
    prop::sample::select(ResourceType::ALL).prop_filter("resource has no wire id", |resource| {
        resource.to_wire().is_ok()
    })
}

/// Strategy for request frames built from logical types.
pub fn request_frame_strategy() -> impl Strategy<Value = RequestFrame> {
    (
        activity_id_strategy(),
        framed_operation_strategy(),
        framed_resource_strategy(),
    )
        .prop_filter_map("type has no wire id", |(id, op, resource)| {
            RequestFrame::new(id, op, resource).ok()
        })
}

/// Strategy for request payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for sort column types.
pub fn item_type_strategy() -> impl Strategy<Value = ItemType> {
    prop_oneof![
        1 => Just(ItemType::Null),
        1 => Just(ItemType::Bool),
        4 => Just(ItemType::Number),
        3 => Just(ItemType::String),
        1 => Just(ItemType::Array),
        1 => Just(ItemType::Object),
    ]
}

/// Strategy for sort orders.
pub fn sort_order_strategy() -> impl Strategy<Value = SortOrder> {
    prop_oneof![Just(SortOrder::Ascending), Just(SortOrder::Descending)]
}

/// Strategy for a value of the given type. Domains are small so that ties
/// are common.
pub fn sort_value_strategy(item_type: ItemType) -> BoxedStrategy<SortValue> {
    let small_number = || (-4i32..4).prop_map(|n| SortValue::Number(f64::from(n)));
    match item_type {
        ItemType::Null => Just(SortValue::Null).boxed(),
        ItemType::Bool => any::<bool>().prop_map(SortValue::Bool).boxed(),
        ItemType::Number => (-50i32..50)
            .prop_map(|n| SortValue::Number(f64::from(n) / 2.0))
            .boxed(),
        ItemType::String => "[a-d]{0,3}".prop_map(SortValue::String).boxed(),
        ItemType::Array => prop::collection::vec(small_number(), 0..3)
            .prop_map(SortValue::Array)
            .boxed(),
        ItemType::Object => prop::collection::btree_map("[ab]", small_number(), 0..3)
            .prop_map(SortValue::Object)
            .boxed(),
    }
}

/// Strategy for one row's sort values, typed column by column.
pub fn sort_values_strategy(types: &[ItemType]) -> BoxedStrategy<Vec<SortValue>> {
    types
        .iter()
        .map(|item_type| sort_value_strategy(*item_type))
        .collect::<Vec<_>>()
        .boxed()
}

/// A sort specification together with the column types of its rows.
#[derive(Debug, Clone)]
pub struct TypedSortSpec {
    /// The sort specification.
    pub spec: SortSpec,
    /// Type of each sort column.
    pub types: Vec<ItemType>,
}

/// Strategy for a sort specification of up to `max_columns` columns.
pub fn typed_sort_spec_strategy(max_columns: usize) -> impl Strategy<Value = TypedSortSpec> {
    prop::collection::vec((item_type_strategy(), sort_order_strategy()), 1..=max_columns.max(1))
        .prop_filter_map("invalid sort spec", |columns| {
            let (types, orders): (Vec<_>, Vec<_>) = columns.into_iter().unzip();
            SortSpec::from_orders(orders)
                .ok()
                .map(|spec| TypedSortSpec { spec, types })
        })
}

/// Strategy for `count` rows sharing one sort specification. Row `i` lives
/// in its own partition range whose lower bound is `i` zero-padded, and
/// carries `i` as its payload.
pub fn comparable_rows_strategy(
    count: impl Into<prop::collection::SizeRange>,
) -> impl Strategy<Value = (SortSpec, Vec<OrderedItem<usize>>)> {
    let count = count.into();
    typed_sort_spec_strategy(3).prop_flat_map(move |typed| {
        let spec = typed.spec.clone();
        prop::collection::vec(sort_values_strategy(&typed.types), count.clone()).prop_map(
            move |rows| {
                let items = rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, values)| {
                        let range = PartitionKeyRange::new(
                            i.to_string(),
                            format!("{i:04}"),
                            format!("{:04}", i + 1),
                        );
                        OrderedItem::new(values, Arc::new(range), i)
                    })
                    .collect();
                (spec.clone(), items)
            },
        )
    })
}

/// Strategy for up to `max_pages` partition pages, each sorted the way the
/// server would return it.
pub fn partition_pages_strategy(
    max_pages: usize,
    max_rows: usize,
) -> impl Strategy<Value = (SortSpec, Vec<PartitionPage<usize>>)> {
    typed_sort_spec_strategy(2).prop_flat_map(move |typed| {
        let spec = typed.spec.clone();
        let page = prop::collection::vec(sort_values_strategy(&typed.types), 0..=max_rows);
        prop::collection::vec(page, 0..=max_pages).prop_map(move |pages| {
            let comparator = OrderByComparator::new(spec.clone());
            let mut next_payload = 0usize;
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(i, mut rows)| {
                    rows.sort_by(|a, b| compare_values(&comparator, a, b));
                    let range = PartitionKeyRange::new(
                        i.to_string(),
                        format!("{i:04}"),
                        format!("{:04}", i + 1),
                    );
                    let rows: Vec<_> = rows
                        .into_iter()
                        .map(|values| {
                            next_payload += 1;
                            (values, next_payload - 1)
                        })
                        .collect();
                    PartitionPage::new(range, rows)
                })
                .collect();
            (spec.clone(), pages)
        })
    })
}

/// Orders two rows of the same partition with `comparator`.
fn compare_values(comparator: &OrderByComparator, a: &[SortValue], b: &[SortValue]) -> Ordering {
    let range = Arc::new(PartitionKeyRange::new("", "", ""));
    let a = OrderedItem::new(a.to_vec(), Arc::clone(&range), ());
    let b = OrderedItem::new(b.to_vec(), range, ());
    comparator.compare(&a, &b).unwrap_or(Ordering::Equal)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 200,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use nimbus_codec::{decode_message, encode_message, try_decode_message, MAX_MESSAGE_SIZE};
    use nimbus_query::merge_pages;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn frame_roundtrips_through_envelope(
            frame in request_frame_strategy(),
            payload in payload_strategy(),
        ) {
            let bytes = encode_message(&frame, &payload, MAX_MESSAGE_SIZE).unwrap();
            let message = decode_message(&bytes, MAX_MESSAGE_SIZE).unwrap();
            prop_assert_eq!(message.frame, frame);
            prop_assert_eq!(&message.payload[..], &payload[..]);
        }

        #[test]
        fn streaming_decode_waits_for_whole_message(
            frame in request_frame_strategy(),
            payload in payload_strategy(),
            split in any::<prop::sample::Index>(),
        ) {
            let bytes = encode_message(&frame, &payload, MAX_MESSAGE_SIZE).unwrap();
            let split = split.index(bytes.len());

            let mut buf = BytesMut::from(&bytes[..split]);
            prop_assert!(try_decode_message(&mut buf, MAX_MESSAGE_SIZE).unwrap().is_none());
            prop_assert_eq!(buf.len(), split);

            buf.extend_from_slice(&bytes[split..]);
            buf.extend_from_slice(b"next");
            let message = try_decode_message(&mut buf, MAX_MESSAGE_SIZE).unwrap().unwrap();
            prop_assert_eq!(message.frame, frame);
            prop_assert_eq!(&buf[..], b"next");
        }

        #[test]
        fn comparator_is_antisymmetric((spec, rows) in comparable_rows_strategy(2..6)) {
            let comparator = OrderByComparator::new(spec);
            for a in &rows {
                for b in &rows {
                    let forward = comparator.compare(a, b).unwrap();
                    let backward = comparator.compare(b, a).unwrap();
                    prop_assert_eq!(forward, backward.reverse());
                }
            }
        }

        #[test]
        fn comparator_is_transitive((spec, rows) in comparable_rows_strategy(3..6)) {
            let comparator = OrderByComparator::new(spec);
            let le = |a: &OrderedItem<usize>, b: &OrderedItem<usize>| {
                comparator.compare(a, b).unwrap() != Ordering::Greater
            };
            for a in &rows {
                for b in &rows {
                    for c in &rows {
                        if le(a, b) && le(b, c) {
                            prop_assert!(le(a, c));
                        }
                    }
                }
            }
        }

        #[test]
        fn comparator_is_strict_across_ranges((spec, rows) in comparable_rows_strategy(2..6)) {
            let comparator = OrderByComparator::new(spec);
            for a in &rows {
                for b in &rows {
                    let ord = comparator.compare(a, b).unwrap();
                    prop_assert_eq!(ord == Ordering::Equal, a.payload == b.payload);
                }
            }
        }

        #[test]
        fn merge_is_sorted_and_complete((spec, pages) in partition_pages_strategy(4, 6)) {
            let total: usize = pages.iter().map(PartitionPage::len).sum();
            let comparator = OrderByComparator::new(spec);
            let merged = merge_pages(&comparator, pages, None).unwrap();

            prop_assert_eq!(merged.len(), total);
            for pair in merged.windows(2) {
                prop_assert_ne!(comparator.compare(&pair[0], &pair[1]).unwrap(), Ordering::Greater);
            }
            let mut payloads: Vec<usize> = merged.iter().map(|item| item.payload).collect();
            payloads.sort_unstable();
            prop_assert_eq!(payloads, (0..total).collect::<Vec<_>>());
        }
    }
}
