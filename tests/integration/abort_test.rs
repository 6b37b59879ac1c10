// tests/integration/abort_test.rs

use crate::common::{FixtureMessage, test_handler};
use filestor_handler::core::bucket::BucketId;
use filestor_handler::core::external::BucketSetAbort;
use std::collections::HashSet;
use std::time::Duration;

/// Scenario 6: an abort command matching a subset of queued buckets removes
/// only those entries, delivering ABORTED replies for them and leaving the
/// rest dispatchable.
#[tokio::test]
async fn abort_flushes_only_matching_entries() {
    let handler = test_handler(1);

    let msg_a = FixtureMessage::put(0xA, 100);
    let id_a = msg_a.unique_id;
    let msg_b = FixtureMessage::put(0xB, 100);
    let id_b = msg_b.unique_id;
    let msg_c = FixtureMessage::put(0xC, 100);
    let id_c = msg_c.unique_id;

    handler.schedule(Box::new(msg_a), 0).unwrap();
    handler.schedule(Box::new(msg_b), 0).unwrap();
    handler.schedule(Box::new(msg_c), 0).unwrap();

    let cmd = BucketSetAbort {
        buckets: HashSet::from([BucketId::from_raw(0xA), BucketId::from_raw(0xC)]),
    };
    let replies = handler.abort_queued_operations(&cmd);

    assert_eq!(replies.len(), 2);
    let aborted_ids: HashSet<u64> = replies.iter().map(|r| r.unique_msg_id).collect();
    assert_eq!(aborted_ids, HashSet::from([id_a, id_c]));
    for reply in &replies {
        assert_eq!(reply.error.code(), "ABORTED");
    }

    let (msg, _lock) = handler
        .get_next_message(0, 0, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(msg.unique_id(), id_b);

    let nothing_left = handler
        .get_next_message(0, 0, Some(Duration::from_millis(50)))
        .await;
    assert!(nothing_left.is_none());
}
