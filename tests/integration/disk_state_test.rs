// tests/integration/disk_state_test.rs

use crate::common::{CapturingSender, FixtureMessage, test_handler_with_sender};
use filestor_handler::core::disk_state::DiskState;
use std::sync::Arc;
use std::time::Duration;

/// Closing a disk flushes every still-queued entry with DISK_FAILURE instead
/// of leaving it to time out on its own schedule, and wakes any blocked
/// `get_next_message` caller immediately.
#[tokio::test]
async fn closing_disk_drains_queue_with_disk_failure() {
    let sender = CapturingSender::new();
    let handler = test_handler_with_sender(2, Arc::new(sender.clone()));

    let message = FixtureMessage::put(0x70, 100).with_timeout(Duration::from_secs(30));
    let unique_id = message.unique_id;
    handler.schedule(Box::new(message), 0).unwrap();

    let handler2 = handler.clone();
    let waiter = tokio::spawn(async move {
        handler2
            .get_next_message(0, 1, Some(Duration::from_secs(5)))
            .await
    });

    handler.set_disk_state(0, DiskState::Closed);

    let woke = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("close must wake blocked workers promptly")
        .unwrap();
    assert!(woke.is_none());

    let replies = sender.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].unique_msg_id, unique_id);
    assert_eq!(replies[0].error.code(), "DISK_FAILURE");
}

/// Disabling a disk for maintenance drains the queue with NOT_READY rather
/// than DISK_FAILURE, and does not wake blocked workers (the disk may come
/// back OPEN, unlike CLOSED which is terminal).
#[tokio::test]
async fn disabling_disk_drains_queue_with_not_ready() {
    let sender = CapturingSender::new();
    let handler = test_handler_with_sender(1, Arc::new(sender.clone()));

    let message = FixtureMessage::put(0x71, 100);
    let unique_id = message.unique_id;
    handler.schedule(Box::new(message), 0).unwrap();

    handler.set_disk_state(0, DiskState::DisabledByMaintenance);

    let replies = sender.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].unique_msg_id, unique_id);
    assert_eq!(replies[0].error.code(), "NOT_READY");
}

/// Scheduling against a disabled disk is rejected up front; it never reaches
/// the queue to begin with.
#[tokio::test]
async fn scheduling_against_disabled_disk_is_rejected() {
    let handler = test_handler_with_sender(1, Arc::new(CapturingSender::new()));
    handler.set_disk_state(0, DiskState::DisabledByMaintenance);

    let result = handler.schedule(Box::new(FixtureMessage::put(0x72, 100)), 0);
    assert!(result.is_err());
}
