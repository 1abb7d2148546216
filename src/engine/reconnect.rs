use std::time::Duration;

use serde::Serialize;
use strum_macros::Display;

use crate::config::ManagerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    Closed,
    Errored,
}

/// Inputs to the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Broker acknowledged the session.
    Opened,
    /// Socket closed by the remote end, or a reconnect attempt failed.
    Lost,
    /// Backoff elapsed.
    RetryDue,
    /// Terminal failure: error before connect, application error, retries exhausted.
    Failed,
    /// Closed by us.
    Stopped,
}

impl ConnectionStatus {
    /// Next status, or `None` when the event does not apply in this status.
    pub fn next(self, event: LinkEvent) -> Option<ConnectionStatus> {
        use ConnectionStatus::*;
        use LinkEvent::*;
        match (self, event) {
            (Closed | Errored, _) => None,
            (_, Stopped) => Some(Closed),
            (_, Failed) => Some(Errored),
            (Connecting, Opened) => Some(Connected),
            (Connecting | Connected, Lost) => Some(Reconnecting),
            (Reconnecting, RetryDue) => Some(Connecting),
            _ => None,
        }
    }
}

/// Capped retry count with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            backoff: config.reconnect_backoff,
        }
    }

    /// Delay before attempt number `attempts_made + 1`, or `None` once the cap is hit.
    pub fn next_delay(&self, attempts_made: u32) -> Option<Duration> {
        (attempts_made < self.max_attempts).then_some(self.backoff)
    }
}
