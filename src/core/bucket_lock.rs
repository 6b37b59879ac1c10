// src/core/bucket_lock.rs

//! `BucketLock`: the scoped handle returned to a worker when a message is
//! dispatched. Its `Drop` impl is the single release path — the handler
//! never requires a worker to remember to call `release` explicitly.

use crate::core::bucket::BucketId;
use crate::core::message::LockMode;
use crate::core::stripe::Stripe;
use std::sync::Arc;

/// Held by a worker for the duration of one bucket operation. Not `Clone`:
/// at most one lock handle exists per (stripe, bucket, holder) triple, and
/// the type system enforces that a worker cannot accidentally duplicate its
/// lock. Safe to move across tasks (e.g. `tokio::spawn`).
#[derive(Debug)]
pub struct BucketLock {
    stripe: Arc<Stripe>,
    bucket: BucketId,
    mode: LockMode,
    unique_msg_id: u64,
    released: bool,
}

impl BucketLock {
    pub(crate) fn new(
        stripe: Arc<Stripe>,
        bucket: BucketId,
        mode: LockMode,
        unique_msg_id: u64,
    ) -> Self {
        Self {
            stripe,
            bucket,
            mode,
            unique_msg_id,
            released: false,
        }
    }

    pub fn bucket(&self) -> BucketId {
        self.bucket
    }

    pub fn locking_requirements(&self) -> LockMode {
        self.mode
    }
}

impl Drop for BucketLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stripe.release(self.bucket, self.mode, self.unique_msg_id);
    }
}
