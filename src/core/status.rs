// src/core/status.rs

//! Renders `Handler::getStatus`: a per-disk/per-stripe dump of queue length
//! and held locks, as plain text or an HTML fragment depending on the
//! request path. Not normative in its exact layout — only the fields it
//! surfaces (queue length, lock holders with priority/timestamp) are.

use crate::core::disk::DiskStatus;
use crate::core::handler::Handler;
use std::fmt::Write as _;

/// Which rendering `getStatus` should produce, selected by the caller's
/// request path (e.g. `/status` vs `/status.html`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFormat {
    Text,
    Html,
}

pub fn render_status(handler: &Handler, format: StatusFormat) -> String {
    let disks = handler.all_disk_status();
    match format {
        StatusFormat::Text => render_text(&disks),
        StatusFormat::Html => render_html(&disks),
    }
}

fn render_text(disks: &[DiskStatus]) -> String {
    let mut out = String::new();
    for disk in disks {
        let _ = writeln!(out, "disk {} state={}", disk.index, disk.state);
        for stripe in &disk.stripes {
            let _ = writeln!(
                out,
                "  stripe {} queue_len={} locks={}",
                stripe.index,
                stripe.queue_len,
                stripe.locks.len()
            );
            for (bucket, holders) in &stripe.locks {
                for holder in holders {
                    let _ = writeln!(
                        out,
                        "    bucket {bucket} msg={} type={} priority={} held_for={:?}",
                        holder.unique_msg_id,
                        holder.message_type,
                        holder.priority,
                        holder.timestamp.elapsed(),
                    );
                }
            }
        }
    }
    out
}

fn render_html(disks: &[DiskStatus]) -> String {
    let mut out = String::from("<div class=\"filestor-status\">\n");
    for disk in disks {
        let _ = writeln!(
            out,
            "<h2>disk {} <small>{}</small></h2>",
            disk.index,
            disk.state
        );
        out.push_str("<table>\n<tr><th>stripe</th><th>queue_len</th><th>locks</th></tr>\n");
        for stripe in &disk.stripes {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                stripe.index,
                stripe.queue_len,
                stripe.locks.len()
            );
        }
        out.push_str("</table>\n");
        for stripe in &disk.stripes {
            if stripe.locks.is_empty() {
                continue;
            }
            let _ = writeln!(out, "<h3>stripe {} locks</h3>", stripe.index);
            out.push_str("<table>\n<tr><th>bucket</th><th>msg</th><th>type</th><th>priority</th><th>held_for</th></tr>\n");
            for (bucket, holders) in &stripe.locks {
                for holder in holders {
                    let _ = writeln!(
                        out,
                        "<tr><td>{bucket}</td><td>{}</td><td>{}</td><td>{}</td><td>{:?}</td></tr>",
                        holder.unique_msg_id,
                        holder.message_type,
                        holder.priority,
                        holder.timestamp.elapsed(),
                    );
                }
            }
            out.push_str("</table>\n");
        }
    }
    out.push_str("</div>\n");
    out
}

/// Total number of currently-held locks across every disk/stripe, used by
/// callers that just want a quick liveness signal without the full dump.
pub fn total_held_locks(handler: &Handler) -> usize {
    handler
        .all_disk_status()
        .iter()
        .flat_map(|d| &d.stripes)
        .flat_map(|s| &s.locks)
        .map(|(_, holders)| holders.len())
        .sum()
}
