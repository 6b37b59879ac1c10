// tests/integration/dispatch_test.rs

use crate::common::{FixtureMessage, test_handler};
use filestor_handler::core::bucket::BucketId;
use std::time::Duration;

/// Scenario 1: basic FIFO at equal priority, with release unblocking a
/// second waiter.
#[tokio::test]
async fn fifo_at_equal_priority_unblocks_on_release() {
    let handler = test_handler(4);
    let bucket = BucketId::from_raw(0x40);
    let stripe = handler.stripe_index_for(0, bucket);

    let first = FixtureMessage::put(0x40, 100);
    let first_id = first.unique_id;
    let second = FixtureMessage::put(0x40, 100);
    let second_id = second.unique_id;
    handler.schedule(Box::new(first), 0).unwrap();
    handler.schedule(Box::new(second), 0).unwrap();

    let (msg, lock1) = handler
        .get_next_message(0, stripe, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    assert_eq!(msg.unique_id(), first_id);

    let handler2 = handler.clone();
    let waiter = tokio::spawn(async move {
        handler2
            .get_next_message(0, stripe, Some(Duration::from_secs(2)))
            .await
    });

    // The second worker must still be blocked: bucket 0x40 is exclusively
    // held by `lock1`.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    drop(lock1);

    let (msg2, _lock2) = waiter.await.unwrap().unwrap();
    assert_eq!(msg2.unique_id(), second_id);
}

/// Scenario 2: a lower-priority-value message that arrives second still
/// dispatches first.
#[tokio::test]
async fn priority_preempts_arrival_order() {
    // A single stripe so both buckets share one priority-ordered queue,
    // isolating the ordering rule from stripe routing.
    let handler = test_handler(1);
    let low_priority_first = FixtureMessage::put(0x10, 200);
    let high_priority_second = FixtureMessage::put(0x20, 100);
    let expected_id = high_priority_second.unique_id;

    handler.schedule(Box::new(low_priority_first), 0).unwrap();
    handler.schedule(Box::new(high_priority_second), 0).unwrap();

    let (msg, _lock) = handler
        .get_next_message(0, 0, Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(msg.unique_id(), expected_id);
}

/// Scenario 3: a second exclusive write against the same, already-locked
/// bucket cannot dispatch and the caller times out.
#[tokio::test]
async fn same_bucket_lock_blocks_second_writer() {
    let handler = test_handler(1);
    let bucket = BucketId::from_raw(0x100);
    let stripe = handler.stripe_index_for(0, bucket);

    handler.schedule(Box::new(FixtureMessage::put(0x100, 100)), 0).unwrap();
    handler.schedule(Box::new(FixtureMessage::put(0x100, 100)), 0).unwrap();

    let (_msg, _lock) = handler
        .get_next_message(0, stripe, Some(Duration::from_secs(1)))
        .await
        .unwrap();

    let second = handler
        .get_next_message(0, stripe, Some(Duration::from_millis(100)))
        .await;
    assert!(second.is_none(), "second writer must not dispatch while the bucket is locked");
}

/// Scenario 4: shared-mode reads on the same bucket all proceed
/// concurrently.
#[tokio::test]
async fn shared_reads_proceed_concurrently() {
    let handler = test_handler(1);
    let bucket = BucketId::from_raw(0x200);
    let stripe = handler.stripe_index_for(0, bucket);

    for _ in 0..3 {
        handler.schedule(Box::new(FixtureMessage::get(0x200, 100)), 0).unwrap();
    }

    let mut locks = Vec::new();
    for _ in 0..3 {
        let (_msg, lock) = handler
            .get_next_message(0, stripe, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        locks.push(lock);
    }
    assert_eq!(locks.len(), 3);
}
