mod error;
mod manager;
mod reconnect;
mod registry;
mod routing;

pub use error::ManagerError;
pub use manager::{
    ConnectionManager, ManagerCommand, STOP_ANALYSIS_ACTION, StopTarget, StoppedAnalysis,
};
pub use reconnect::{ConnectionStatus, LinkEvent, ReconnectPolicy};
pub use registry::MessageCallback;
pub use routing::{Reconciliation, TopicKind, matches, reconcile};
