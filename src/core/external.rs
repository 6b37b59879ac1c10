// src/core/external.rs

//! Small consumed interfaces implemented by collaborators outside this
//! crate: the merge/abort command source and the document-id-to-bucket
//! factory used by split remap.

use crate::core::bucket::BucketId;

/// A command that can sweep queued or active messages out of the handler,
/// e.g. because a bucket set is being re-partitioned away from this node.
pub trait AbortCommand: Send + Sync {
    /// Whether messages targeting `bucket` should be aborted.
    fn should_abort(&self, bucket: BucketId) -> bool;
}

/// Resolves the child bucket of `source` that `document_id` routes to during
/// split remap. The owning partition tree may keep its own document-id
/// index; `BitSplitBucketIdFactory` is the default used when it doesn't.
pub trait BucketIdFactory: Send + Sync {
    fn bucket_id_for(&self, source: BucketId, document_id: u64) -> BucketId;
}

/// The default `BucketIdFactory`: routes by `BucketId::child_for_document`'s
/// bit-split arithmetic, the same scheme `BucketId::split_children` uses to
/// produce the two candidate targets in the first place.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitSplitBucketIdFactory;

impl BucketIdFactory for BitSplitBucketIdFactory {
    fn bucket_id_for(&self, source: BucketId, document_id: u64) -> BucketId {
        source.child_for_document(document_id)
    }
}

/// An `AbortCommand` that matches a fixed set of buckets; the common case
/// used by tests and by simple upstream callers.
#[derive(Debug, Clone, Default)]
pub struct BucketSetAbort {
    pub buckets: std::collections::HashSet<BucketId>,
}

impl AbortCommand for BucketSetAbort {
    fn should_abort(&self, bucket: BucketId) -> bool {
        self.buckets.contains(&bucket)
    }
}
