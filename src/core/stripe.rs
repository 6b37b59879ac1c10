// src/core/stripe.rs

//! `Stripe`: one dispatch shard. Owns one queue, one lock table, and one
//! notification primitive — the "monitor" the spec describes in terms of a
//! mutex plus condition variable. The synchronous state (queue + lock table)
//! lives behind a `parking_lot::Mutex` so dispatch scans never cross an
//! await point while holding it; `tokio::sync::Notify` stands in for the
//! condition variable workers block on between scans.

use crate::core::bucket::BucketId;
use crate::core::bucket_lock::BucketLock;
use crate::core::disk_state::{AtomicDiskState, DiskState};
use crate::core::errors::HandlerError;
use crate::core::external::{AbortCommand, BucketIdFactory};
use crate::core::lock::{BucketLockTable, LockEntry, MultiLockEntry};
use crate::core::message::{LockMode, MessageEntry, StorageMessage};
use crate::core::metrics;
use crate::core::queue::PriorityQueue;
use crate::core::sender::{MessageSender, SyntheticReply};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// The kind of bucket-tree operation driving a `remap_across_stripes` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapOp {
    /// A single target bucket, e.g. a bucket ownership handoff.
    Move,
    /// Two target buckets: the children produced by splitting the source.
    Split,
    /// A single target bucket: the parent the source's sibling is joining
    /// into.
    Join,
}

struct StripeState {
    queue: PriorityQueue,
    locks: BucketLockTable,
}

/// An independent dispatch shard within a disk.
pub struct Stripe {
    pub index: usize,
    state: parking_lot::Mutex<StripeState>,
    notify: Notify,
    sequence: AtomicU64,
    sender: Arc<dyn MessageSender>,
}

/// A snapshot of one stripe's queue/lock contents, for `getStatus`.
pub struct StripeStatus {
    pub index: usize,
    pub queue_len: usize,
    pub locks: Vec<(BucketId, Vec<crate::core::lock::LockEntry>)>,
}

impl Stripe {
    pub fn new(index: usize, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            index,
            state: parking_lot::Mutex::new(StripeState {
                queue: PriorityQueue::new(),
                locks: BucketLockTable::new(),
            }),
            notify: Notify::new(),
            sequence: AtomicU64::new(0),
            sender,
        }
    }

    /// Pushes `message` into this stripe's queue and notifies one waiter.
    /// Returns `false` only if the stripe itself has been torn down, which
    /// this implementation never does outside of process shutdown — kept
    /// for parity with the contract so callers have a rejection path to
    /// wire up if a future version adds stripe-level teardown.
    pub fn schedule(&self, message: Box<dyn StorageMessage>) -> bool {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let entry = MessageEntry::new(message, sequence);
        trace!(stripe = self.index, bucket = %entry.bucket, priority = entry.priority, "scheduled");
        {
            let mut state = self.state.lock();
            state.queue.push(entry);
        }
        metrics::MESSAGES_SCHEDULED_TOTAL.inc();
        self.notify.notify_one();
        true
    }

    /// Blocks until a runnable message is found, the disk closes, or
    /// `timeout` elapses. On each wakeup the full priority-ordered scan
    /// restarts, reaping any entries that timed out along the way.
    pub async fn get_next_message(
        self: &Arc<Self>,
        timeout: Duration,
        disk_state: &AtomicDiskState,
    ) -> Option<(Box<dyn StorageMessage>, BucketLock)> {
        loop {
            let notified = {
                let mut state = self.state.lock();
                if let Some((message, bucket, mode, unique_msg_id)) =
                    self.scan_and_dispatch(&mut state)
                {
                    drop(state);
                    let lock = BucketLock::new(self.clone(), bucket, mode, unique_msg_id);
                    return Some((message, lock));
                }
                if disk_state.load() == DiskState::Closed {
                    return None;
                }
                // Register interest before releasing the lock so a
                // schedule()/release() that races with this check is never
                // missed.
                self.notify.notified()
            };

            match tokio::time::timeout(timeout, notified).await {
                Ok(()) => continue,
                Err(_) => return None,
            }
        }
    }

    /// One priority-ordered scan: reaps expired entries, and removes +
    /// returns the first runnable entry found (installing its lock). Caller
    /// holds `state`'s mutex.
    fn scan_and_dispatch(
        &self,
        state: &mut StripeState,
    ) -> Option<(Box<dyn StorageMessage>, BucketId, LockMode, u64)> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut runnable = None;

        for entry in state.queue.iter_priority_order() {
            if entry.is_expired(now) {
                expired.push(entry.unique_msg_id);
                continue;
            }
            if runnable.is_none() && state.locks.is_runnable(entry.bucket, entry.lock_mode()) {
                runnable = Some(entry.unique_msg_id);
            }
        }

        for id in expired {
            if let Some(entry) = state.queue.remove(id) {
                debug!(stripe = self.index, bucket = %entry.bucket, msg = id, "timed out in queue");
                metrics::MESSAGES_TIMED_OUT_TOTAL.inc();
                self.sender.send_reply(SyntheticReply {
                    unique_msg_id: entry.unique_msg_id,
                    message_type: entry.message.message_type(),
                    error: HandlerError::Timeout,
                });
            }
        }

        let id = runnable?;
        let entry = state.queue.remove(id)?;
        let mode = entry.lock_mode();
        let wait = entry.wait_time(now);
        metrics::DISPATCH_WAIT_SECONDS.observe(wait.as_secs_f64());
        metrics::MESSAGES_DISPATCHED_TOTAL
            .with_label_values(&[entry.message.message_type()])
            .inc();
        state.locks.acquire(
            entry.bucket,
            mode,
            LockEntry::new(entry.priority, entry.message.message_type(), entry.unique_msg_id),
        );
        trace!(stripe = self.index, bucket = %entry.bucket, msg = id, ?wait, "dispatched");
        Some((entry.message, entry.bucket, mode, entry.unique_msg_id))
    }

    /// Releases a bucket lock held by `unique_msg_id` and wakes one blocked
    /// waiter. Called exclusively from `BucketLock::drop`.
    pub(crate) fn release(&self, bucket: BucketId, mode: LockMode, unique_msg_id: u64) {
        {
            let mut state = self.state.lock();
            state.locks.release(bucket, mode, unique_msg_id);
        }
        trace!(stripe = self.index, %bucket, msg = unique_msg_id, "released");
        self.notify.notify_one();
    }

    /// Acquires a lock out-of-band, without going through the queue. Used by
    /// `Handler::lock` for maintenance tooling. Blocks until the lock is
    /// grantable.
    pub async fn lock_out_of_band(
        self: &Arc<Self>,
        bucket: BucketId,
        mode: LockMode,
        unique_msg_id: u64,
        priority: u8,
        message_type: &'static str,
    ) -> BucketLock {
        loop {
            let notified = {
                let mut state = self.state.lock();
                if state.locks.is_runnable(bucket, mode) {
                    state
                        .locks
                        .acquire(bucket, mode, LockEntry::new(priority, message_type, unique_msg_id));
                    drop(state);
                    return BucketLock::new(self.clone(), bucket, mode, unique_msg_id);
                }
                self.notify.notified()
            };
            notified.await;
        }
    }

    /// Removes every queued entry targeting `bucket` and synthesises a
    /// reply with `error` for each. Does not touch active (locked) work.
    pub fn fail_operations(&self, bucket: BucketId, error: HandlerError) {
        let removed: Vec<MessageEntry> = {
            let mut state = self.state.lock();
            state
                .queue
                .ids_for_bucket(bucket)
                .into_iter()
                .filter_map(|id| state.queue.remove(id))
                .collect()
        };
        for entry in removed {
            warn!(stripe = self.index, %bucket, msg = entry.unique_msg_id, ?error, "failed queued operation");
            self.sender.send_reply(SyntheticReply {
                unique_msg_id: entry.unique_msg_id,
                message_type: entry.message.message_type(),
                error: error.clone(),
            });
        }
    }

    /// Removes every queued entry for which `cmd.should_abort` holds and
    /// which is abortable, returning the synthesised ABORTED replies for the
    /// caller to deliver.
    pub fn abort(&self, cmd: &dyn AbortCommand) -> Vec<SyntheticReply> {
        let mut state = self.state.lock();
        let candidate_ids: Vec<u64> = state
            .queue
            .iter_priority_order()
            .filter(|e| cmd.should_abort(e.bucket) && e.message.may_be_aborted())
            .map(|e| e.unique_msg_id)
            .collect();

        let mut replies = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if let Some(entry) = state.queue.remove(id) {
                metrics::MESSAGES_ABORTED_TOTAL.inc();
                replies.push(SyntheticReply {
                    unique_msg_id: entry.unique_msg_id,
                    message_type: entry.message.message_type(),
                    error: HandlerError::Aborted,
                });
            }
        }
        replies
    }

    /// Blocks until no *active* (locked) holder satisfies `cmd.should_abort`.
    /// Used by callers that need a quiescent point before re-partitioning a
    /// bucket set. Queued (not yet dispatched) entries are irrelevant here;
    /// abort them first via `abort`.
    pub async fn wait_inactive(self: &Arc<Self>, cmd: &dyn AbortCommand) {
        loop {
            let notified = {
                let state = self.state.lock();
                let still_active = state
                    .locks
                    .iter()
                    .any(|(bucket, _)| cmd.should_abort(*bucket));
                if !still_active {
                    return;
                }
                self.notify.notified()
            };
            notified.await;
        }
    }

    /// Removes every queued entry on this stripe, regardless of bucket, and
    /// synthesises a reply with `error` for each. Used when the owning disk
    /// transitions to CLOSED or DISABLED_BY_MAINTENANCE so nothing is left
    /// waiting for a per-message timeout it will never usefully reach.
    pub fn drain_all(&self, error: HandlerError) {
        let removed = self.state.lock().queue.drain_all();
        for entry in removed {
            warn!(
                stripe = self.index,
                bucket = %entry.bucket,
                msg = entry.unique_msg_id,
                ?error,
                "flushed queued operation on disk state transition"
            );
            self.sender.send_reply(SyntheticReply {
                unique_msg_id: entry.unique_msg_id,
                message_type: entry.message.message_type(),
                error: error.clone(),
            });
        }
    }

    pub fn notify_closed(&self) {
        self.notify.notify_waiters();
    }

    /// A stable address used to pick a deterministic lock order across two
    /// or more stripes' monitors. Only used by `remap_across_stripes`, the
    /// one operation that ever holds more than one stripe monitor at once.
    fn monitor_addr(&self) -> usize {
        std::ptr::addr_of!(self.state) as usize
    }

    pub fn status(&self) -> StripeStatus {
        let state = self.state.lock();
        let queue_len = state.queue.len();
        let locks = state
            .locks
            .iter()
            .map(|(bucket, entry)| {
                let holders = match entry {
                    MultiLockEntry::Exclusive(e) => vec![e.clone()],
                    MultiLockEntry::Shared(holders) => holders.values().cloned().collect(),
                };
                (*bucket, holders)
            })
            .collect();
        StripeStatus {
            index: self.index,
            queue_len,
            locks,
        }
    }
}

fn position_of(guards: &[(usize, parking_lot::MutexGuard<'_, StripeState>)], stripe_index: usize) -> usize {
    guards
        .iter()
        .position(|(idx, _)| *idx == stripe_index)
        .expect("stripe was locked above")
}

/// Locks `stripes`' monitors simultaneously, in ascending monitor-address
/// order, deduplicated by pointer identity first (a source and target bucket
/// can hash to the same stripe). This is the one place more than one stripe
/// monitor is ever held at once; a single global order across every caller
/// rules out deadlock between concurrent remaps touching overlapping stripe
/// sets.
fn lock_monitors<'a>(
    stripes: &[&'a Arc<Stripe>],
) -> Vec<(usize, parking_lot::MutexGuard<'a, StripeState>)> {
    let mut unique: Vec<&'a Arc<Stripe>> = Vec::new();
    for s in stripes {
        if !unique.iter().any(|u| Arc::ptr_eq(u, s)) {
            unique.push(s);
        }
    }
    unique.sort_by_key(|s| s.monitor_addr());
    unique.into_iter().map(|s| (s.index, s.state.lock())).collect()
}

/// Moves every queued entry targeting `source_bucket` on `source` to its new
/// bucket(s), per `op`. Locks `source` and every stripe in `targets`
/// simultaneously for the whole operation — per the cross-stripe remap
/// invariant, the target is computed (SPLIT reads `document_id` through
/// `factory`) and the move applied while every stripe that could be involved
/// is already held, so no other dispatch can interleave a conflicting
/// schedule or timeout reap in between. Never touches active (locked)
/// messages; those must finish or be aborted first.
pub fn remap_across_stripes(
    source: &Arc<Stripe>,
    source_bucket: BucketId,
    targets: &[(BucketId, Arc<Stripe>)],
    op: RemapOp,
    factory: &Arc<dyn BucketIdFactory>,
    sender: &Arc<dyn MessageSender>,
) {
    let mut all: Vec<&Arc<Stripe>> = Vec::with_capacity(1 + targets.len());
    all.push(source);
    for (_, stripe) in targets {
        all.push(stripe);
    }
    let mut guards = lock_monitors(&all);

    let source_pos = position_of(&guards, source.index);
    let ids = guards[source_pos].1.queue.ids_for_bucket(source_bucket);

    for id in ids {
        let Some(mut entry) = guards[source_pos].1.queue.remove(id) else {
            // Dispatched concurrently with the listing above; it's in flight
            // now, remap doesn't touch it.
            continue;
        };

        let target_bucket = match op {
            RemapOp::Move | RemapOp::Join => targets[0].0,
            RemapOp::Split => match entry.message.document_id() {
                Some(doc_id) => factory.bucket_id_for(source_bucket, doc_id),
                None => {
                    warn!(
                        bucket = %source_bucket,
                        msg = entry.unique_msg_id,
                        "split remap: message carries no document id, rejecting"
                    );
                    sender.send_reply(SyntheticReply {
                        unique_msg_id: entry.unique_msg_id,
                        message_type: entry.message.message_type(),
                        error: HandlerError::BucketNotFound,
                    });
                    continue;
                }
            },
        };

        entry.bucket = target_bucket;
        let target_stripe = targets
            .iter()
            .find(|(bucket, _)| *bucket == target_bucket)
            .map(|(_, stripe)| stripe)
            .unwrap_or_else(|| {
                panic!(
                    "invariant violation: remap target bucket {target_bucket} matched \
                     none of the supplied target stripes"
                )
            });
        let target_pos = position_of(&guards, target_stripe.index);
        guards[target_pos].1.queue.push(entry);
    }

    drop(guards);
    for (_, stripe) in targets {
        stripe.notify.notify_one();
    }
}

impl std::fmt::Debug for Stripe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stripe").field("index", &self.index).finish()
    }
}
