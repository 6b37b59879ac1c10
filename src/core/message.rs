// src/core/message.rs

//! `MessageEntry` and the `StorageMessage` trait external callers implement
//! to describe a pending bucket operation.

use crate::core::bucket::BucketId;
use std::time::{Duration, Instant};

/// The lock mode a message requires while it executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Sole-holder lock required by any state-modifying operation.
    Exclusive,
    /// Multi-holder lock permitted for read-only operations.
    Shared,
}

/// The externally-defined message contract. The wire protocol and RPC
/// decoding that produce these values live outside this crate; the handler
/// only ever reads through this trait.
pub trait StorageMessage: Send + Sync + std::fmt::Debug {
    /// Lower value means higher priority, per the dispatch ordering rule.
    fn priority(&self) -> u8;

    /// Globally unique id for this message, stable for its lifetime. Used as
    /// the key for its `LockEntry` and for `abort`/`remap` bookkeeping.
    fn unique_id(&self) -> u64;

    /// How long this message may sit in the queue before it is reaped with a
    /// `TIMEOUT` reply.
    fn timeout(&self) -> Duration;

    /// The bucket this message targets. Every schedulable message is
    /// bucket-addressed; routing to a stripe depends on it.
    fn bucket_id(&self) -> BucketId;

    /// The document id this message carries, if any. Used by split remap to
    /// compute the child bucket via `BucketId::child_for_document`. Absent
    /// for bucket-level commands such as an explicit split/join trigger.
    fn document_id(&self) -> Option<u64>;

    /// The lock mode this message requires to run.
    fn lock_mode(&self) -> LockMode;

    /// A short label identifying the message's operation kind, used in
    /// `LockEntry` bookkeeping and status rendering (e.g. `"put"`, `"get"`).
    fn message_type(&self) -> &'static str;

    /// Whether this message may be removed from the queue by an abort
    /// command. Reads and internal control messages are never abortable;
    /// state-modifying operations (put/remove/update/split/join/merge) are.
    fn may_be_aborted(&self) -> bool;
}

/// Wraps a pending message with its routing and scheduling metadata. Created
/// on `schedule`; destroyed when dispatched (moved into the lock table) or
/// reaped (timeout/abort).
#[derive(Debug)]
pub struct MessageEntry {
    pub message: Box<dyn StorageMessage>,
    pub bucket: BucketId,
    pub priority: u8,
    pub enqueued_at: Instant,
    pub unique_msg_id: u64,
    /// Monotonic sequence number assigned at enqueue time; used as the
    /// tie-break among equal-priority entries (earlier first).
    pub sequence: u64,
}

impl MessageEntry {
    pub fn new(message: Box<dyn StorageMessage>, sequence: u64) -> Self {
        let priority = message.priority();
        let unique_msg_id = message.unique_id();
        let bucket = message.bucket_id();
        Self {
            message,
            bucket,
            priority,
            enqueued_at: Instant::now(),
            unique_msg_id,
            sequence,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.enqueued_at) >= self.message.timeout()
    }

    pub fn wait_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.enqueued_at)
    }

    pub fn lock_mode(&self) -> LockMode {
        self.message.lock_mode()
    }
}
