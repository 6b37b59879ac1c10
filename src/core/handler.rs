// src/core/handler.rs

//! `Handler`: the top-level facade. Owns every disk, routes messages,
//! implements pause/resume, remap-on-split-join-move, abort, and
//! merge-status tracking.

use crate::core::bucket::BucketId;
use crate::core::bucket_lock::BucketLock;
use crate::core::disk::{Disk, DiskStatus};
use crate::core::disk_state::DiskState;
use crate::core::errors::HandlerError;
use crate::core::external::{AbortCommand, BucketIdFactory};
use crate::core::merge::{MergeStatus, MergeTracker};
use crate::core::message::{LockMode, StorageMessage};
use crate::core::sender::MessageSender;
pub use crate::core::stripe::RemapOp;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;

/// Owns every `Disk` plus the process-wide pause gate and merge tracker.
pub struct Handler {
    disks: Vec<Disk>,
    merges: MergeTracker,
    sender: Arc<dyn MessageSender>,
    bucket_id_factory: Arc<dyn BucketIdFactory>,
    paused: AtomicBool,
    pause_notify: Notify,
    default_next_message_timeout: Duration,
}

impl Handler {
    pub fn new(
        num_disks: usize,
        stripes_per_disk: usize,
        default_next_message_timeout: Duration,
        sender: Arc<dyn MessageSender>,
        bucket_id_factory: Arc<dyn BucketIdFactory>,
    ) -> Arc<Self> {
        let disks = (0..num_disks)
            .map(|i| Disk::new(i, stripes_per_disk, sender.clone()))
            .collect();
        Arc::new(Self {
            disks,
            merges: MergeTracker::new(),
            sender,
            bucket_id_factory,
            paused: AtomicBool::new(false),
            pause_notify: Notify::new(),
            default_next_message_timeout,
        })
    }

    pub fn num_disks(&self) -> usize {
        self.disks.len()
    }

    /// Panics if `disk_idx` is out of range: an out-of-range disk index is a
    /// programming error by the caller, the same class of bug `lock.rs`
    /// treats as an invariant violation rather than a `Result` a caller
    /// could silently ignore.
    fn disk(&self, disk_idx: usize) -> &Disk {
        self.disks.get(disk_idx).unwrap_or_else(|| {
            panic!(
                "invariant violation: no disk {disk_idx} (num_disks={})",
                self.disks.len()
            )
        })
    }

    /// Which stripe `bucket` hashes to on `disk_idx`. Exposed so callers
    /// (and tests) can target `get_next_message` at the right stripe without
    /// duplicating the hash-mixing function.
    pub fn stripe_index_for(&self, disk_idx: usize, bucket: BucketId) -> usize {
        self.disk(disk_idx).stripe_index_for(bucket)
    }

    /// Routes `message` to the disk at `disk_idx`. Fails with `Rejected` if
    /// that disk is not currently OPEN.
    pub fn schedule(&self, message: Box<dyn StorageMessage>, disk_idx: usize) -> Result<(), HandlerError> {
        self.disk(disk_idx).schedule(message).inspect_err(|_| {
            crate::core::metrics::MESSAGES_REJECTED_TOTAL.inc();
        })
    }

    /// Blocks (honoring the pause gate) until a runnable message is found on
    /// the given stripe, the disk closes, or `timeout` elapses.
    pub async fn get_next_message(
        &self,
        disk_idx: usize,
        stripe_id: usize,
        timeout: Option<Duration>,
    ) -> Option<(Box<dyn StorageMessage>, BucketLock)> {
        self.wait_while_paused().await;
        let timeout = timeout.unwrap_or(self.default_next_message_timeout);
        self.disk(disk_idx).get_next_message(stripe_id, timeout).await
    }

    async fn wait_while_paused(&self) {
        loop {
            let notified = self.pause_notify.notified();
            if !self.paused.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Acquires a bucket lock out-of-band, without going through the queue.
    /// Used by maintenance tooling that needs to hold a bucket briefly
    /// without enqueueing a `StorageMessage`.
    pub async fn lock(
        &self,
        bucket: BucketId,
        disk_idx: usize,
        mode: LockMode,
        unique_msg_id: u64,
        priority: u8,
    ) -> BucketLock {
        let disk = self.disk(disk_idx);
        let stripe_idx = disk.stripe_index_for(bucket);
        let stripe = disk.stripe(stripe_idx).expect("stripe_index_for is in range");
        stripe
            .lock_out_of_band(bucket, mode, unique_msg_id, priority, "out_of_band")
            .await
    }

    /// Moves every queued entry targeting `source` to its new bucket(s), per
    /// `op`. Never touches active (locked) messages — those are already in
    /// flight and must finish or be aborted first.
    ///
    /// `source`'s stripe and every target bucket's stripe are resolved up
    /// front and locked simultaneously (address-ordered, see
    /// `stripe::remap_across_stripes`) for the whole operation: the spec
    /// requires both source and target monitors held together, not acquired
    /// and released one at a time. SPLIT's per-entry target bucket isn't
    /// known until the entry's document id is read, but both of a split's
    /// two possible target *stripes* are already determined by `targets`, so
    /// they can be locked before any entry is inspected.
    pub fn remap_queue(&self, source: BucketId, disk_idx: usize, targets: &[BucketId], op: RemapOp) {
        let disk = self.disk(disk_idx);
        let source_stripe = disk
            .stripe(disk.stripe_index_for(source))
            .expect("stripe_index_for is in range");
        let target_stripes: Vec<(BucketId, Arc<crate::core::stripe::Stripe>)> = targets
            .iter()
            .map(|&bucket| {
                let stripe = disk
                    .stripe(disk.stripe_index_for(bucket))
                    .expect("stripe_index_for is in range")
                    .clone();
                (bucket, stripe)
            })
            .collect();

        crate::core::stripe::remap_across_stripes(
            source_stripe,
            source,
            &target_stripes,
            op,
            &self.bucket_id_factory,
            &self.sender,
        );
    }

    /// Removes every queued entry for `bucket` on `disk_idx`, replying with
    /// `error` for each. Does not touch active (locked) work.
    pub fn fail_operations(&self, bucket: BucketId, disk_idx: usize, error: HandlerError) {
        let disk = self.disk(disk_idx);
        let stripe_idx = disk.stripe_index_for(bucket);
        disk.stripe(stripe_idx)
            .expect("stripe_index_for is in range")
            .fail_operations(bucket, error);
    }

    /// Sweeps every disk/stripe for queued entries `cmd` matches, returning
    /// the synthesised ABORTED replies for the caller to deliver.
    pub fn abort_queued_operations(&self, cmd: &dyn AbortCommand) -> Vec<crate::core::sender::SyntheticReply> {
        self.disks
            .iter()
            .flat_map(|disk| disk.stripes())
            .flat_map(|stripe| stripe.abort(cmd))
            .collect()
    }

    /// Blocks until no active (locked) message on any disk/stripe satisfies
    /// `cmd.should_abort`.
    pub async fn wait_inactive(&self, cmd: &dyn AbortCommand) {
        for disk in &self.disks {
            for stripe in disk.stripes() {
                stripe.wait_inactive(cmd).await;
            }
        }
    }

    pub fn add_merge_status(&self, bucket: BucketId, status: MergeStatus) {
        self.merges.add(bucket, status);
    }

    pub fn edit_merge_status(&self, bucket: BucketId, f: impl FnOnce(&mut MergeStatus)) -> bool {
        self.merges.edit(bucket, f)
    }

    pub fn is_merging(&self, bucket: BucketId) -> bool {
        self.merges.is_merging(bucket)
    }

    /// Clears `bucket`'s merge status. If `ret_code` is `Some`, any pending
    /// `GetBucket`-style replies parked on the merge are synthesised and
    /// sent immediately.
    pub fn clear_merge_status(&self, bucket: BucketId, ret_code: Option<HandlerError>) {
        for reply in self.merges.clear(bucket, ret_code) {
            self.sender.send_reply(reply);
        }
    }

    /// Returns a scoped guard; while held, all `get_next_message` callers
    /// block on the pause gate before consulting any stripe. Used for
    /// coordinated maintenance (e.g. external bucket manipulation).
    pub fn pause(self: &Arc<Self>) -> PauseGuard {
        self.paused.store(true, Ordering::Release);
        PauseGuard {
            handler: self.clone(),
        }
    }

    /// Transitions every disk to CLOSED and wakes every blocked worker so
    /// they observe the new state and return. Terminal for the process
    /// lifetime of each disk.
    pub fn close(&self) {
        info!("closing handler: all disks transitioning to CLOSED");
        for disk in &self.disks {
            disk.set_state(DiskState::Closed);
        }
    }

    pub fn set_disk_state(&self, disk_idx: usize, state: DiskState) {
        self.disk(disk_idx).set_state(state);
    }

    pub fn disk_status(&self, disk_idx: usize) -> DiskStatus {
        self.disk(disk_idx).status()
    }

    pub fn all_disk_status(&self) -> Vec<DiskStatus> {
        self.disks.iter().map(Disk::status).collect()
    }
}

/// Releasing the guard clears the pause flag and wakes every worker blocked
/// on the pause gate.
pub struct PauseGuard {
    handler: Arc<Handler>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        self.handler.paused.store(false, Ordering::Release);
        self.handler.pause_notify.notify_waiters();
    }
}
