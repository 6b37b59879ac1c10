// src/core/errors.rs

//! Defines the primary error type for the handler crate.

use thiserror::Error;

/// The return-code style error surface the handler emits. Mirrors the common
/// storage return-code enum referenced by external collaborators: most
/// variants are synthesised as replies rather than propagated as `Err`, but
/// `Handler`'s direct (non-queue) entry points such as `schedule()` return
/// these through `Result` as well.
///
/// An out-of-range disk or stripe index is not among these variants: it is a
/// programming error by the caller, not a recoverable runtime condition, and
/// is handled the same way `lock.rs` handles a double release or release of
/// an untracked lock — `panic!` with context, rather than a `Result` a
/// caller could silently ignore.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The queued message exceeded its per-message timeout before dispatch.
    #[error("TIMEOUT")]
    Timeout,

    /// An abort command matched the message while it was still queued.
    #[error("ABORTED")]
    Aborted,

    /// A remap found no valid child/target bucket for a queued message.
    #[error("BUCKET_NOT_FOUND")]
    BucketNotFound,

    /// The bucket the message targeted no longer exists on this node.
    #[error("BUCKET_DELETED")]
    BucketDeleted,

    /// The disk transitioned to `CLOSED` while the message was queued.
    #[error("DISK_FAILURE")]
    DiskFailure,

    /// The disk is `DISABLED_BY_MAINTENANCE` and cannot currently serve work.
    #[error("NOT_READY")]
    NotReady,

    /// `schedule` was called against a disk that is not `OPEN`.
    #[error("REJECTED: disk {0} is not accepting work")]
    Rejected(usize),
}

impl HandlerError {
    /// The stable return-code token external callers (HTTP status page,
    /// upstream RPC layer) key off of.
    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::Timeout => "TIMEOUT",
            HandlerError::Aborted => "ABORTED",
            HandlerError::BucketNotFound => "BUCKET_NOT_FOUND",
            HandlerError::BucketDeleted => "BUCKET_DELETED",
            HandlerError::DiskFailure => "DISK_FAILURE",
            HandlerError::NotReady => "NOT_READY",
            HandlerError::Rejected(_) => "REJECTED",
        }
    }
}
