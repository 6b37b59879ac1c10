// src/core/merge.rs

//! Cross-replica merge status tracking. The merge protocol's state machine
//! lives outside this crate; the handler only tracks whether a bucket is
//! currently merging and holds pending replies that must be flushed once the
//! merge concludes. Merges do not themselves consume the bucket lock table —
//! they cooperate with it via the messages they enqueue like any other
//! operation.

use crate::core::errors::HandlerError;
use crate::core::sender::SyntheticReply;
use dashmap::DashMap;

/// Per-bucket merge bookkeeping.
#[derive(Debug, Default, Clone)]
pub struct MergeStatus {
    /// Opaque protocol-specific state, owned by the merge state machine.
    pub phase: String,
    /// Unique ids of GetBucket-style requests parked waiting on this merge,
    /// to be answered once the merge clears.
    pub pending_get_bucket_results: Vec<u64>,
}

impl MergeStatus {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            pending_get_bucket_results: Vec::new(),
        }
    }
}

/// Tracks in-flight merges by bucket, independent of the stripe lock tables.
#[derive(Debug, Default)]
pub struct MergeTracker {
    merges: DashMap<crate::core::bucket::BucketId, MergeStatus>,
}

impl MergeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bucket: crate::core::bucket::BucketId, status: MergeStatus) {
        self.merges.insert(bucket, status);
    }

    pub fn edit(
        &self,
        bucket: crate::core::bucket::BucketId,
        f: impl FnOnce(&mut MergeStatus),
    ) -> bool {
        match self.merges.get_mut(&bucket) {
            Some(mut entry) => {
                f(&mut entry);
                true
            }
            None => false,
        }
    }

    pub fn is_merging(&self, bucket: crate::core::bucket::BucketId) -> bool {
        self.merges.contains_key(&bucket)
    }

    /// Removes the merge entry for `bucket`. If `ret_code` is `Some`, every
    /// pending GetBucket reply parked on this merge is synthesised with that
    /// error and returned for the caller to deliver.
    pub fn clear(
        &self,
        bucket: crate::core::bucket::BucketId,
        ret_code: Option<HandlerError>,
    ) -> Vec<SyntheticReply> {
        let Some((_, status)) = self.merges.remove(&bucket) else {
            return Vec::new();
        };
        let Some(error) = ret_code else {
            return Vec::new();
        };
        status
            .pending_get_bucket_results
            .into_iter()
            .map(|id| SyntheticReply {
                unique_msg_id: id,
                message_type: "get_bucket",
                error: error.clone(),
            })
            .collect()
    }
}
