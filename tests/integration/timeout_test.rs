// tests/integration/timeout_test.rs

use crate::common::{CapturingSender, FixtureMessage, test_handler_with_sender};
use std::sync::Arc;
use std::time::Duration;

/// P6: a message whose declared timeout has elapsed is reaped as TIMEOUT
/// instead of ever being dispatched, even though nothing else contends for
/// its bucket.
#[tokio::test]
async fn expired_message_is_reaped_not_dispatched() {
    let sender = CapturingSender::new();
    let handler = test_handler_with_sender(1, Arc::new(sender.clone()));

    let message = FixtureMessage::put(0x50, 100).with_timeout(Duration::from_millis(20));
    let unique_id = message.unique_id;
    handler.schedule(Box::new(message), 0).unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;

    let result = handler
        .get_next_message(0, 0, Some(Duration::from_millis(100)))
        .await;
    assert!(result.is_none(), "expired message must never be dispatched");

    let replies = sender.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].unique_msg_id, unique_id);
    assert_eq!(replies[0].error.code(), "TIMEOUT");
}

/// `fail_operations` sweeps a bucket's queued entries with a caller-chosen
/// error, used e.g. when a disk is about to be torn down.
#[tokio::test]
async fn fail_operations_flushes_bucket_with_given_error() {
    use filestor_handler::core::bucket::BucketId;
    use filestor_handler::core::errors::HandlerError;

    let sender = CapturingSender::new();
    let handler = test_handler_with_sender(1, Arc::new(sender.clone()));

    let message = FixtureMessage::put(0x60, 100);
    let unique_id = message.unique_id;
    handler.schedule(Box::new(message), 0).unwrap();

    handler.fail_operations(BucketId::from_raw(0x60), 0, HandlerError::DiskFailure);

    let replies = sender.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].unique_msg_id, unique_id);
    assert_eq!(replies[0].error.code(), "DISK_FAILURE");

    let nothing_left = handler
        .get_next_message(0, 0, Some(Duration::from_millis(50)))
        .await;
    assert!(nothing_left.is_none());
}
