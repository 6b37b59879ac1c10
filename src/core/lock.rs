// src/core/lock.rs

//! The per-stripe lock table: tracks, for every currently-locked bucket,
//! either a single exclusive holder or a set of shared holders. Never both.

use crate::core::bucket::BucketId;
use crate::core::message::LockMode;
use std::collections::HashMap;
use std::time::Instant;

/// One lock holder's bookkeeping, used by `getStatus` and by `release` to
/// identify the specific shared holder to drop.
#[derive(Debug, Clone)]
pub struct LockEntry {
    pub timestamp: Instant,
    pub priority: u8,
    pub message_type: &'static str,
    pub unique_msg_id: u64,
}

impl LockEntry {
    pub fn new(priority: u8, message_type: &'static str, unique_msg_id: u64) -> Self {
        Self {
            timestamp: Instant::now(),
            priority,
            message_type,
            unique_msg_id,
        }
    }
}

/// The lock state for a single bucket: either one exclusive holder, or a set
/// of shared holders keyed by their unique message id. Construction always
/// goes through `exclusive`/`shared_with` so the two variants can never be
/// populated simultaneously.
#[derive(Debug)]
pub enum MultiLockEntry {
    Exclusive(LockEntry),
    Shared(HashMap<u64, LockEntry>),
}

impl MultiLockEntry {
    pub fn exclusive(entry: LockEntry) -> Self {
        MultiLockEntry::Exclusive(entry)
    }

    pub fn shared_with(entry: LockEntry) -> Self {
        let mut holders = HashMap::with_capacity(1);
        holders.insert(entry.unique_msg_id, entry);
        MultiLockEntry::Shared(holders)
    }

    pub fn holder_count(&self) -> usize {
        match self {
            MultiLockEntry::Exclusive(_) => 1,
            MultiLockEntry::Shared(holders) => holders.len(),
        }
    }

    pub fn holders(&self) -> Vec<&LockEntry> {
        match self {
            MultiLockEntry::Exclusive(entry) => vec![entry],
            MultiLockEntry::Shared(holders) => holders.values().collect(),
        }
    }
}

/// Maps locked buckets to their current holders. Lives inside a single
/// stripe's monitor; every method here assumes the caller already holds that
/// mutex.
#[derive(Debug, Default)]
pub struct BucketLockTable {
    locks: HashMap<BucketId, MultiLockEntry>,
}

impl BucketLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `mode` may be granted for `bucket` given its current lock
    /// state: EXCLUSIVE requires the bucket be entirely absent; SHARED
    /// requires it be absent or already shared-only.
    pub fn is_runnable(&self, bucket: BucketId, mode: LockMode) -> bool {
        match (self.locks.get(&bucket), mode) {
            (None, _) => true,
            (Some(MultiLockEntry::Shared(_)), LockMode::Shared) => true,
            _ => false,
        }
    }

    /// Installs a new `LockEntry` for `bucket` under `mode`. Panics (a
    /// programming-error invariant violation) if the current state forbids
    /// it; callers must check `is_runnable` first under the same monitor
    /// acquisition.
    pub fn acquire(&mut self, bucket: BucketId, mode: LockMode, entry: LockEntry) {
        match mode {
            LockMode::Exclusive => {
                if let Some(existing) = self.locks.get(&bucket) {
                    panic!(
                        "invariant violation: acquiring EXCLUSIVE lock on bucket {bucket} \
                         which already has {} holder(s)",
                        existing.holder_count()
                    );
                }
                self.locks.insert(bucket, MultiLockEntry::exclusive(entry));
            }
            LockMode::Shared => match self.locks.get_mut(&bucket) {
                None => {
                    self.locks.insert(bucket, MultiLockEntry::shared_with(entry));
                }
                Some(MultiLockEntry::Shared(holders)) => {
                    holders.insert(entry.unique_msg_id, entry);
                }
                Some(MultiLockEntry::Exclusive(_)) => {
                    panic!(
                        "invariant violation: acquiring SHARED lock on bucket {bucket} \
                         which is held EXCLUSIVE"
                    );
                }
            },
        }
    }

    /// Releases a holder. Panics if the bucket isn't locked at all, or if a
    /// SHARED release names a `unique_msg_id` that isn't a current holder —
    /// both are programming errors (double release, or releasing a lock the
    /// caller never held).
    pub fn release(&mut self, bucket: BucketId, mode: LockMode, unique_msg_id: u64) {
        let Some(entry) = self.locks.get_mut(&bucket) else {
            panic!("invariant violation: release of bucket {bucket} which is not locked");
        };
        let now_empty = match (entry, mode) {
            (MultiLockEntry::Exclusive(held), LockMode::Exclusive) => {
                if held.unique_msg_id != unique_msg_id {
                    panic!(
                        "invariant violation: release of bucket {bucket} by msg {unique_msg_id} \
                         does not match exclusive holder {}",
                        held.unique_msg_id
                    );
                }
                true
            }
            (MultiLockEntry::Shared(holders), LockMode::Shared) => {
                if holders.remove(&unique_msg_id).is_none() {
                    panic!(
                        "invariant violation: release of bucket {bucket} by msg {unique_msg_id} \
                         which does not hold a shared lock on it"
                    );
                }
                holders.is_empty()
            }
            _ => panic!(
                "invariant violation: release mode mismatch on bucket {bucket} for msg {unique_msg_id}"
            ),
        };
        if now_empty {
            self.locks.remove(&bucket);
        }
    }

    pub fn get(&self, bucket: BucketId) -> Option<&MultiLockEntry> {
        self.locks.get(&bucket)
    }

    pub fn is_locked(&self, bucket: BucketId) -> bool {
        self.locks.contains_key(&bucket)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketId, &MultiLockEntry)> {
        self.locks.iter()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
