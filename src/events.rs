//! Events surfaced to the presentation layer.
//!
//! [`ClientCore`](crate::client::ClientCore) queues these while it works
//! and the host drains them once per frame with `drain_events()`.

use crate::mirror::MergeReport;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------
    /// Handshake complete; snapshots now flow into the mirror.
    Connected,
    Disconnected,
    /// The reconnect delay has passed; the host should reopen the
    /// transport.  `attempt` counts from 1.
    ReconnectDue { attempt: u32 },
    /// Retries are used up; no further `ReconnectDue` will follow.
    ReconnectExhausted { attempts: u32 },

    // ------------------------------------------------------------------
    // Server replies
    // ------------------------------------------------------------------
    Ack { ok: bool, msg: Option<String> },
    /// Rejected command or similar.  Informational only.
    ServerError(String),

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------
    SnapshotApplied { tick: u64, report: MergeReport },
}
