// tests/property/invariants_test.rs

use crate::common::{FixtureMessage, test_handler};
use filestor_handler::core::bucket::{BucketId, fnv1a_mix};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    /// P3 — stripe stability: routing a bucket to a stripe is a pure
    /// function of the bucket id and stripe count, matching the public
    /// mixing function directly.
    #[test]
    fn stripe_routing_is_pure_and_matches_the_mixing_function(
        raw in any::<u64>(),
        stripes in 1usize..64,
    ) {
        let handler = test_handler(stripes);
        let bucket = BucketId::from_raw(raw);
        let expected = (fnv1a_mix(bucket) as usize) % stripes;
        let first = handler.stripe_index_for(0, bucket);
        let second = handler.stripe_index_for(0, bucket);
        prop_assert_eq!(first, expected);
        prop_assert_eq!(first, second);
    }

    /// P1 — exclusivity: under arbitrary interleavings of exclusive/shared
    /// schedules across a handful of buckets on one (maximally contended)
    /// stripe, every message is eventually dispatched exactly once and the
    /// lock table's own invariant checks (which panic on violation) never
    /// fire.
    #[test]
    fn exclusivity_holds_under_concurrent_drain(
        ops in prop::collection::vec((0u8..4, any::<bool>(), 1u8..=250u8), 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let handler = test_handler(1);
            let total = ops.len();

            for (bucket, exclusive, priority) in &ops {
                let message: Box<dyn filestor_handler::core::message::StorageMessage> = if *exclusive {
                    Box::new(FixtureMessage::put(*bucket as u64, *priority))
                } else {
                    Box::new(FixtureMessage::get(*bucket as u64, *priority))
                };
                handler.schedule(message, 0).unwrap();
            }

            async fn drain(handler: Arc<filestor_handler::core::handler::Handler>) -> usize {
                let mut count = 0;
                loop {
                    match handler
                        .get_next_message(0, 0, Some(Duration::from_millis(30)))
                        .await
                    {
                        Some((_, lock)) => {
                            count += 1;
                            drop(lock);
                        }
                        None => break,
                    }
                }
                count
            }

            let (a, b) = tokio::join!(drain(handler.clone()), drain(handler.clone()));
            assert_eq!(a + b, total, "every scheduled message must be dispatched exactly once");
        });
    }
}
