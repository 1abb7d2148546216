#[cfg(any(test, feature = "testing"))]
mod memory;
mod stomp;
mod stomp_ws;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryConnector, MemoryTransport, WireCall};
pub use stomp::{Command as StompCommand, Frame as StompFrame, FrameError};
pub use stomp_ws::{StompConnector, StompTransport};
pub use transport::{Connector, SubscriptionId, Transport, TransportEvent};
