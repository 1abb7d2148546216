use std::fmt;

/// Stable internal key of one connection. Assigned when a card starts and never
/// changes, whatever id the backend later hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub(crate) u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Identifies one transport session of a connection. A reconnect opens a new
/// session, so late events from a dead socket can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTag {
    pub handle: ConnectionHandle,
    pub session: u64,
}
