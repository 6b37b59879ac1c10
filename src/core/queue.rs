// src/core/queue.rs

//! The per-stripe pending-message queue, indexed three ways: FIFO insertion
//! order, priority order (with insertion order as the tie-break), and by
//! target bucket. Boost's multi-index container inspired the shape of the
//! original design; here the same semantics are reached with an `IndexMap`
//! holding the entries plus two auxiliary indices over its keys.

use crate::core::bucket::BucketId;
use crate::core::message::MessageEntry;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A multi-index priority queue of `MessageEntry`, keyed by each entry's
/// `unique_msg_id`.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    /// Primary storage, also the FIFO index (insertion-ordered).
    entries: IndexMap<u64, MessageEntry>,
    /// `(priority, sequence) -> unique_msg_id`, ordered so iteration yields
    /// the dispatch-priority order with earlier-enqueued entries breaking
    /// ties at equal priority.
    by_priority: BTreeSet<(u8, u64, u64)>,
    /// `bucket -> set of unique_msg_id`, for O(1) bucket-targeted scans
    /// (`fail_operations`, `remap_queue`).
    by_bucket: HashMap<BucketId, HashSet<u64>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: MessageEntry) {
        let id = entry.unique_msg_id;
        self.by_priority
            .insert((entry.priority, entry.sequence, id));
        self.by_bucket
            .entry(entry.bucket)
            .or_default()
            .insert(id);
        self.entries.insert(id, entry);
    }

    /// Iterates queued entries in dispatch-priority order (lowest priority
    /// value first, earliest sequence breaking ties). Does not mutate the
    /// queue; callers remove entries explicitly via `remove`.
    pub fn iter_priority_order(&self) -> impl Iterator<Item = &MessageEntry> + '_ {
        self.by_priority
            .iter()
            .map(move |&(_, _, id)| self.entries.get(&id).expect("by_priority/entries desync"))
    }

    /// Removes and returns the entry with the given unique message id, if
    /// still queued.
    pub fn remove(&mut self, unique_msg_id: u64) -> Option<MessageEntry> {
        let entry = self.entries.shift_remove(&unique_msg_id)?;
        self.by_priority
            .remove(&(entry.priority, entry.sequence, unique_msg_id));
        if let Some(ids) = self.by_bucket.get_mut(&entry.bucket) {
            ids.remove(&unique_msg_id);
            if ids.is_empty() {
                self.by_bucket.remove(&entry.bucket);
            }
        }
        Some(entry)
    }

    /// All unique message ids currently queued for `bucket`, in no
    /// particular order.
    pub fn ids_for_bucket(&self, bucket: BucketId) -> Vec<u64> {
        self.by_bucket
            .get(&bucket)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, unique_msg_id: u64) -> bool {
        self.entries.contains_key(&unique_msg_id)
    }

    /// Removes and returns every queued entry, in no particular order.
    /// Used when the owning disk transitions to CLOSED or
    /// DISABLED_BY_MAINTENANCE and every queued entry must be flushed.
    pub fn drain_all(&mut self) -> Vec<MessageEntry> {
        self.by_priority.clear();
        self.by_bucket.clear();
        self.entries.drain(..).map(|(_, entry)| entry).collect()
    }
}
