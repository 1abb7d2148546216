use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::SessionTag;

/// Broker-side id of one topic subscription.
pub type SubscriptionId = String;

/// Asynchronous happenings on an open transport, pushed to the manager's
/// event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message {
        tag: SessionTag,
        subscription: SubscriptionId,
        body: String,
    },
    /// Broker reported an error frame or the socket failed mid-stream.
    Error { tag: SessionTag, reason: String },
    /// The socket went away without us asking.
    Closed { tag: SessionTag },
}

impl TransportEvent {
    pub fn tag(&self) -> SessionTag {
        match self {
            TransportEvent::Message { tag, .. }
            | TransportEvent::Error { tag, .. }
            | TransportEvent::Closed { tag } => *tag,
        }
    }
}

/// One live, topic-based publish/subscribe session.
#[async_trait]
pub trait Transport: Send {
    async fn subscribe(&mut self, destination: &str) -> Result<SubscriptionId>;

    async fn unsubscribe(&mut self, subscription: &SubscriptionId) -> Result<()>;

    async fn publish(&mut self, destination: &str, body: &str) -> Result<()>;

    /// Deliberate close. No `Closed` event follows.
    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Opens transports. Resolves once the broker has acknowledged the session,
/// so a returned transport is ready to subscribe and publish.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        tag: SessionTag,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>>;
}
