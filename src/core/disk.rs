// src/core/disk.rs

//! `Disk`: one per backing persistence engine. Owns a fixed vector of
//! stripes and routes bucket-addressed work to exactly one of them.

use crate::core::bucket::{BucketId, fnv1a_mix};
use crate::core::bucket_lock::BucketLock;
use crate::core::disk_state::{AtomicDiskState, DiskState};
use crate::core::errors::HandlerError;
use crate::core::message::StorageMessage;
use crate::core::sender::MessageSender;
use crate::core::stripe::{Stripe, StripeStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

/// One backing disk: a fixed-size pool of independent dispatch stripes, plus
/// the disk's own OPEN/CLOSED/DISABLED lifecycle state.
pub struct Disk {
    pub index: usize,
    stripes: Vec<Arc<Stripe>>,
    state: AtomicDiskState,
    /// Round-robin hint handed to workers with no stripe preference. Does
    /// not by itself guarantee starvation freedom — callers are expected to
    /// iterate all stripes before blocking indefinitely if their preferred
    /// stripe is empty while others are full.
    next_stripe_hint: AtomicUsize,
}

impl Disk {
    pub fn new(index: usize, num_stripes: usize, sender: Arc<dyn MessageSender>) -> Self {
        assert!(num_stripes > 0, "a disk must have at least one stripe");
        let stripes = (0..num_stripes)
            .map(|i| Arc::new(Stripe::new(i, sender.clone())))
            .collect();
        Self {
            index,
            stripes,
            state: AtomicDiskState::new(DiskState::Open),
            next_stripe_hint: AtomicUsize::new(0),
        }
    }

    pub fn num_stripes(&self) -> usize {
        self.stripes.len()
    }

    pub fn state(&self) -> DiskState {
        self.state.load()
    }

    /// Maps a bucket to its stripe: `fnv1a_mix(bucket) mod num_stripes`.
    /// BucketIds cluster siblings in their low bits; the FNV mix decorrelates
    /// them before reduction so split children don't alias onto one stripe.
    pub fn stripe_index_for(&self, bucket: BucketId) -> usize {
        (fnv1a_mix(bucket) as usize) % self.stripes.len()
    }

    pub fn stripe(&self, index: usize) -> Option<&Arc<Stripe>> {
        self.stripes.get(index)
    }

    pub fn stripes(&self) -> &[Arc<Stripe>] {
        &self.stripes
    }

    /// A round-robin starting point for a worker with no stripe preference.
    /// Callers should fall through to the remaining stripes in order rather
    /// than retrying only this one, to avoid starving on a stripe that
    /// happens to be momentarily empty.
    pub fn next_stripe_hint(&self) -> usize {
        let n = self.stripes.len();
        self.next_stripe_hint.fetch_add(1, Ordering::Relaxed) % n
    }

    /// Routes `message` to its stripe, if this disk is currently OPEN.
    pub fn schedule(&self, message: Box<dyn StorageMessage>) -> Result<(), HandlerError> {
        if self.state.load() != DiskState::Open {
            return Err(HandlerError::Rejected(self.index));
        }
        let stripe_idx = self.stripe_index_for(message.bucket_id());
        self.stripes[stripe_idx].schedule(message);
        Ok(())
    }

    /// Delegates to the named stripe. Returns `None` on timeout or once the
    /// disk transitions to CLOSED.
    ///
    /// Panics if `stripe_id` is out of range: an out-of-range stripe id is a
    /// programming error by the caller, the same class of bug `lock.rs`
    /// treats as an invariant violation rather than a `Result` a caller
    /// could silently ignore.
    pub async fn get_next_message(
        &self,
        stripe_id: usize,
        timeout: Duration,
    ) -> Option<(Box<dyn StorageMessage>, BucketLock)> {
        let stripe = self.stripes.get(stripe_id).unwrap_or_else(|| {
            panic!(
                "invariant violation: disk {} has no stripe {stripe_id} (num_stripes={})",
                self.index,
                self.stripes.len()
            )
        });
        stripe.get_next_message(timeout, &self.state).await
    }

    /// `OPEN -> CLOSED` (terminal) or `OPEN <-> DISABLED_BY_MAINTENANCE`.
    ///
    /// Transitioning to CLOSED or DISABLED_BY_MAINTENANCE flushes every
    /// stripe's queue: any entry still waiting for dispatch at the moment of
    /// the transition would otherwise sit until its own per-message timeout
    /// elapses (the wrong error — TIMEOUT instead of DISK_FAILURE/NOT_READY)
    /// or, once no worker calls `get_next_message` again, forever. CLOSED
    /// additionally wakes every blocked worker on every stripe so they
    /// observe the new state and return.
    pub fn set_state(&self, new_state: DiskState) {
        info!(disk = self.index, ?new_state, "disk state transition");
        self.state.store(new_state);
        match new_state {
            DiskState::Closed => {
                for stripe in &self.stripes {
                    stripe.drain_all(HandlerError::DiskFailure);
                    stripe.notify_closed();
                }
            }
            DiskState::DisabledByMaintenance => {
                for stripe in &self.stripes {
                    stripe.drain_all(HandlerError::NotReady);
                }
            }
            DiskState::Open => {}
        }
    }

    pub fn status(&self) -> DiskStatus {
        DiskStatus {
            index: self.index,
            state: self.state.load(),
            stripes: self.stripes.iter().map(|s| s.status()).collect(),
        }
    }
}

pub struct DiskStatus {
    pub index: usize,
    pub state: DiskState,
    pub stripes: Vec<StripeStatus>,
}

impl std::fmt::Debug for Disk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disk")
            .field("index", &self.index)
            .field("state", &self.state.load())
            .field("num_stripes", &self.stripes.len())
            .finish()
    }
}
