// tests/integration/remap_test.rs

use crate::common::{CapturingSender, FixtureMessage, test_handler, test_handler_with_sender};
use filestor_handler::core::bucket::BucketId;
use filestor_handler::core::handler::RemapOp;
use std::sync::Arc;
use std::time::Duration;

/// Scenario 5: a split remap routes a queued message to the correct child
/// bucket by its document id, regardless of whether that child lands on a
/// different stripe.
#[tokio::test]
async fn split_remap_routes_by_document_id() {
    let handler = test_handler(4);
    let source = BucketId::new(12, 0x08);
    let (lo, hi) = source.split_children();

    // document id with the new used-bit clear routes to `lo`.
    let message = FixtureMessage::put(source.as_u64(), 100).with_document_id(0);
    let unique_id = message.unique_id;
    handler.schedule(Box::new(message), 0).unwrap();

    handler.remap_queue(source, 0, &[lo, hi], RemapOp::Split);

    let stripe_lo = handler.stripe_index_for(0, lo);
    let (msg, lock) = handler
        .get_next_message(0, stripe_lo, Some(Duration::from_secs(1)))
        .await
        .unwrap();

    assert_eq!(msg.unique_id(), unique_id);
    assert_eq!(lock.bucket(), lo);
}

/// Both children of a split receive exactly the entries their document ids
/// route to, on a single shared stripe.
#[tokio::test]
async fn split_remap_routes_both_children_correctly() {
    let handler = test_handler(1);
    let source = BucketId::new(12, 0x08);
    let (lo, hi) = source.split_children();

    let lo_msg = FixtureMessage::put(source.as_u64(), 100).with_document_id(0);
    let lo_id = lo_msg.unique_id;
    let hi_msg = FixtureMessage::put(source.as_u64(), 100).with_document_id(1 << 12);
    let hi_id = hi_msg.unique_id;
    handler.schedule(Box::new(lo_msg), 0).unwrap();
    handler.schedule(Box::new(hi_msg), 0).unwrap();

    handler.remap_queue(source, 0, &[lo, hi], RemapOp::Split);

    let (first, lock1) = handler
        .get_next_message(0, 0, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    let first_bucket = lock1.bucket();
    drop(lock1);
    let (second, lock2) = handler
        .get_next_message(0, 0, Some(Duration::from_secs(1)))
        .await
        .unwrap();
    let second_bucket = lock2.bucket();

    let dispatched: std::collections::HashMap<u64, BucketId> =
        [(first.unique_id(), first_bucket), (second.unique_id(), second_bucket)].into();
    assert_eq!(dispatched[&lo_id], lo);
    assert_eq!(dispatched[&hi_id], hi);
}

/// A queued split-candidate message with no document id is rejected with
/// BUCKET_NOT_FOUND rather than silently dropped or mis-routed.
#[tokio::test]
async fn split_remap_rejects_message_without_document_id() {
    let sender = CapturingSender::new();
    let handler = test_handler_with_sender(4, Arc::new(sender.clone()));
    let source = BucketId::new(12, 0x08);
    let (lo, hi) = source.split_children();

    let message = FixtureMessage::put(source.as_u64(), 100);
    let unique_id = message.unique_id;
    handler.schedule(Box::new(message), 0).unwrap();

    handler.remap_queue(source, 0, &[lo, hi], RemapOp::Split);

    let replies = sender.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].unique_msg_id, unique_id);
    assert_eq!(replies[0].error.code(), "BUCKET_NOT_FOUND");

    // Neither child stripe should have anything queued for it now.
    let stripe_lo = handler.stripe_index_for(0, lo);
    let stripe_hi = handler.stripe_index_for(0, hi);
    assert!(
        handler
            .get_next_message(0, stripe_lo, Some(Duration::from_millis(50)))
            .await
            .is_none()
    );
    assert!(
        handler
            .get_next_message(0, stripe_hi, Some(Duration::from_millis(50)))
            .await
            .is_none()
    );
}
