// src/core/sender.rs

//! The narrow interface the handler uses to emit synthetic replies. The
//! actual wire protocol and RPC decoding live outside this crate; callers
//! hand the handler a `MessageSender` implementation during construction.

use crate::core::errors::HandlerError;
use std::fmt;

/// A synthetic reply the handler generates on behalf of a message it is no
/// longer willing to dispatch (timed out, aborted, or its disk went down).
#[derive(Debug, Clone)]
pub struct SyntheticReply {
    pub unique_msg_id: u64,
    pub message_type: &'static str,
    pub error: HandlerError,
}

impl fmt::Display for SyntheticReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} reply for msg {} ({})",
            self.error.code(),
            self.unique_msg_id,
            self.message_type
        )
    }
}

/// Implemented by the RPC layer to deliver synthetic replies the handler
/// produces while it can no longer run a queued message. Delivery failures
/// are logged by callers and otherwise ignored: the handler has already
/// relinquished the message.
pub trait MessageSender: Send + Sync {
    fn send_reply(&self, reply: SyntheticReply);
}

/// A `MessageSender` that only logs; useful for tests and for any process
/// that wants to observe replies without wiring in a real RPC layer.
#[derive(Debug, Default)]
pub struct LoggingMessageSender;

impl MessageSender for LoggingMessageSender {
    fn send_reply(&self, reply: SyntheticReply) {
        tracing::debug!(%reply, "synthetic reply");
    }
}
