//! Debugging feature flags.

#[allow(dead_code)]
pub struct LogFlags {
    /// Log every raw STOMP frame sent and received.
    pub log_stream_frames: bool,

    /// Log temporary id -> backend id remaps.
    pub log_reconciliation: bool,

    /// Log which callback each update was routed to.
    pub log_routing: bool,

    /// Emit paper-trading decisions (opens, closes, skipped signals).
    pub log_simulation_events: bool,
}

pub const DF: LogFlags = LogFlags {
    log_reconciliation: true,

    log_stream_frames: false,
    log_routing: false,
    log_simulation_events: false,
};
