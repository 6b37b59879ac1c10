// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the handler's dispatch and
//! locking core.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire process lifetime.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_histogram,
};

lazy_static! {
    /// Total number of messages handed to `schedule`, across all disks.
    pub static ref MESSAGES_SCHEDULED_TOTAL: Counter =
        register_counter!("filestor_messages_scheduled_total", "Total number of messages accepted by schedule().").unwrap();

    /// Total number of messages handed out by `getNextMessage`, labeled by
    /// the message type (e.g. "put", "get").
    pub static ref MESSAGES_DISPATCHED_TOTAL: CounterVec =
        register_counter_vec!("filestor_messages_dispatched_total", "Total number of messages dispatched to a worker, labeled by message type.", &["message_type"]).unwrap();

    /// Total number of messages reaped as TIMEOUT during a dispatch scan.
    pub static ref MESSAGES_TIMED_OUT_TOTAL: Counter =
        register_counter!("filestor_messages_timed_out_total", "Total number of messages reaped with TIMEOUT before dispatch.").unwrap();

    /// Total number of messages removed by an abort command.
    pub static ref MESSAGES_ABORTED_TOTAL: Counter =
        register_counter!("filestor_messages_aborted_total", "Total number of queued messages removed by an abort command.").unwrap();

    /// Total number of messages rejected at schedule() time due to a
    /// non-OPEN disk.
    pub static ref MESSAGES_REJECTED_TOTAL: Counter =
        register_counter!("filestor_messages_rejected_total", "Total number of messages rejected by schedule() due to disk state.").unwrap();

    /// How long a message waited in the queue before being dispatched.
    pub static ref DISPATCH_WAIT_SECONDS: Histogram =
        register_histogram!("filestor_dispatch_wait_seconds", "Time between a message's enqueue and its dispatch, in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text
/// format, for exposure on the status HTTP server.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
