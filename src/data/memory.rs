//! In-process loopback transport. Records every wire call and lets the caller
//! inject broker traffic, so the manager can be driven without a network.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::{ConnectionHandle, SessionTag};

use super::transport::{Connector, SubscriptionId, Transport, TransportEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireCall {
    Connect {
        handle: ConnectionHandle,
    },
    Subscribe {
        handle: ConnectionHandle,
        subscription: SubscriptionId,
        destination: String,
    },
    Unsubscribe {
        handle: ConnectionHandle,
        subscription: SubscriptionId,
    },
    Publish {
        handle: ConnectionHandle,
        destination: String,
        body: String,
    },
    Close {
        handle: ConnectionHandle,
    },
}

struct SessionState {
    tag: SessionTag,
    events: UnboundedSender<TransportEvent>,
    subscriptions: HashMap<SubscriptionId, String>,
    open: bool,
}

#[derive(Default)]
struct Shared {
    calls: Vec<WireCall>,
    sessions: HashMap<ConnectionHandle, SessionState>,
    refused_connects: usize,
    failing_closes: HashSet<ConnectionHandle>,
    next_subscription: u64,
}

#[derive(Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `count` connects fail as if the server were unreachable.
    pub fn refuse_next_connects(&self, count: usize) {
        self.state().refused_connects = count;
    }

    pub fn fail_close_for(&self, handle: ConnectionHandle) {
        self.state().failing_closes.insert(handle);
    }

    pub fn calls(&self) -> Vec<WireCall> {
        self.state().calls.clone()
    }

    pub fn connect_count(&self, handle: ConnectionHandle) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, WireCall::Connect { handle: h } if *h == handle))
            .count()
    }

    /// Bodies published to `destination`, oldest first.
    pub fn published(&self, destination: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                WireCall::Publish {
                    destination: d,
                    body,
                    ..
                } if d == destination => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    /// Destinations currently subscribed on the live session of `handle`.
    pub fn active_subscriptions(&self, handle: ConnectionHandle) -> Vec<String> {
        let state = self.state();
        let mut destinations: Vec<String> = state
            .sessions
            .get(&handle)
            .filter(|s| s.open)
            .map(|s| s.subscriptions.values().cloned().collect())
            .unwrap_or_default();
        destinations.sort();
        destinations
    }

    pub fn total_active_subscriptions(&self) -> usize {
        self.state()
            .sessions
            .values()
            .filter(|s| s.open)
            .map(|s| s.subscriptions.len())
            .sum()
    }

    pub fn is_open(&self, handle: ConnectionHandle) -> bool {
        self.state().sessions.get(&handle).is_some_and(|s| s.open)
    }

    /// Publishes `body` on `destination` as the broker would. Returns false when
    /// nothing on that connection listens there.
    pub fn deliver(&self, handle: ConnectionHandle, destination: &str, body: &str) -> bool {
        let state = self.state();
        let Some(session) = state.sessions.get(&handle).filter(|s| s.open) else {
            return false;
        };
        let mut delivered = false;
        for (subscription, dest) in &session.subscriptions {
            if dest == destination {
                delivered |= session
                    .events
                    .send(TransportEvent::Message {
                        tag: session.tag,
                        subscription: subscription.clone(),
                        body: body.to_string(),
                    })
                    .is_ok();
            }
        }
        delivered
    }

    /// Simulates the network dropping the socket.
    pub fn drop_connection(&self, handle: ConnectionHandle) {
        let mut state = self.state();
        if let Some(session) = state.sessions.get_mut(&handle) {
            session.open = false;
            session.subscriptions.clear();
            let _ = session.events.send(TransportEvent::Closed { tag: session.tag });
        }
    }

    /// Simulates the broker sending an ERROR frame.
    pub fn raise_error(&self, handle: ConnectionHandle, reason: &str) {
        let state = self.state();
        if let Some(session) = state.sessions.get(&handle) {
            let _ = session.events.send(TransportEvent::Error {
                tag: session.tag,
                reason: reason.to_string(),
            });
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        tag: SessionTag,
        events: UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn Transport>> {
        let mut state = self.state();
        state.calls.push(WireCall::Connect { handle: tag.handle });
        if state.refused_connects > 0 {
            state.refused_connects -= 1;
            bail!("connection refused");
        }
        state.sessions.insert(
            tag.handle,
            SessionState {
                tag,
                events,
                subscriptions: HashMap::new(),
                open: true,
            },
        );
        Ok(Box::new(MemoryTransport {
            tag,
            shared: self.shared.clone(),
        }))
    }
}

pub struct MemoryTransport {
    tag: SessionTag,
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    fn state(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(&mut self, destination: &str) -> Result<SubscriptionId> {
        let handle = self.tag.handle;
        let mut state = self.state();
        let subscription = format!("sub-{}", state.next_subscription);
        state.next_subscription += 1;
        match state.sessions.get_mut(&handle) {
            Some(session) if session.open && session.tag == self.tag => {
                session
                    .subscriptions
                    .insert(subscription.clone(), destination.to_string());
            }
            _ => bail!("session {} is closed", handle),
        }
        state.calls.push(WireCall::Subscribe {
            handle,
            subscription: subscription.clone(),
            destination: destination.to_string(),
        });
        Ok(subscription)
    }

    async fn unsubscribe(&mut self, subscription: &SubscriptionId) -> Result<()> {
        let handle = self.tag.handle;
        let mut state = self.state();
        if let Some(session) = state.sessions.get_mut(&handle).filter(|s| s.tag == self.tag) {
            session.subscriptions.remove(subscription);
        }
        state.calls.push(WireCall::Unsubscribe {
            handle,
            subscription: subscription.clone(),
        });
        Ok(())
    }

    async fn publish(&mut self, destination: &str, body: &str) -> Result<()> {
        if !self.is_open() {
            bail!("session {} is closed", self.tag.handle);
        }
        self.state().calls.push(WireCall::Publish {
            handle: self.tag.handle,
            destination: destination.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let handle = self.tag.handle;
        let mut state = self.state();
        state.calls.push(WireCall::Close { handle });
        if state.failing_closes.contains(&handle) {
            bail!("close of {} failed", handle);
        }
        if let Some(session) = state.sessions.get_mut(&handle).filter(|s| s.tag == self.tag) {
            session.open = false;
            session.subscriptions.clear();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        let state = self.state();
        state
            .sessions
            .get(&self.tag.handle)
            .is_some_and(|s| s.open && s.tag == self.tag)
    }
}
