use std::collections::HashMap;

use crate::analysis::PaperTrader;
use crate::data::{SubscriptionId, Transport};
use crate::domain::{Card, ConnectionHandle};
use crate::models::AnalysisUpdate;

use super::reconnect::ConnectionStatus;
use super::routing::TopicKind;

/// Update handler registered for one card. Receives the card's current id.
pub type MessageCallback = Box<dyn FnMut(&str, &AnalysisUpdate) + Send>;

/// All state of one connection. Keyed by its stable handle, so an id remap
/// never moves it.
pub struct ConnectionEntry {
    pub card: Card,
    pub status: ConnectionStatus,
    /// Session number of the transport currently (or last) attached.
    pub session: u64,
    pub transport: Option<Box<dyn Transport>>,
    pub subscriptions: HashMap<SubscriptionId, TopicKind>,
    pub callback: Option<MessageCallback>,
    pub reconnect_attempts: u32,
    /// Set once the first update has been rendered.
    pub streaming: bool,
    pub simulation: Option<PaperTrader>,
}

impl ConnectionEntry {
    pub fn new(card: Card, session: u64) -> Self {
        Self {
            card,
            status: ConnectionStatus::Connecting,
            session,
            transport: None,
            subscriptions: HashMap::new(),
            callback: None,
            reconnect_attempts: 0,
            streaming: false,
            simulation: None,
        }
    }

    pub fn current_id(&self) -> &str {
        self.card.current_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebindError {
    UnknownHandle,
    /// Another live connection already owns the id.
    Taken(ConnectionHandle),
}

/// Two-level lookup: external id -> handle -> entry. Only `by_id` is rewritten
/// when the backend hands out a new id.
#[derive(Default)]
pub struct Registry {
    next_handle: u64,
    by_id: HashMap<String, ConnectionHandle>,
    entries: HashMap<ConnectionHandle, ConnectionEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> ConnectionHandle {
        self.next_handle += 1;
        ConnectionHandle(self.next_handle)
    }

    pub fn insert(&mut self, handle: ConnectionHandle, entry: ConnectionEntry) {
        self.by_id.insert(entry.current_id().to_string(), handle);
        self.entries.insert(handle, entry);
    }

    pub fn resolve(&self, id: &str) -> Option<ConnectionHandle> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, handle: ConnectionHandle) -> Option<&ConnectionEntry> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut ConnectionEntry> {
        self.entries.get_mut(&handle)
    }

    /// Points `new_id` at `handle` and drops the old id. Returns the old id.
    pub fn rebind(&mut self, handle: ConnectionHandle, new_id: &str) -> Result<String, RebindError> {
        match self.by_id.get(new_id) {
            Some(owner) if *owner != handle => return Err(RebindError::Taken(*owner)),
            _ => {}
        }
        let entry = self.entries.get_mut(&handle).ok_or(RebindError::UnknownHandle)?;
        let old_id = entry.current_id().to_string();
        entry.card.backend_id = Some(new_id.to_string());
        self.by_id.remove(&old_id);
        self.by_id.insert(new_id.to_string(), handle);
        Ok(old_id)
    }

    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<ConnectionEntry> {
        let entry = self.entries.remove(&handle)?;
        self.by_id.retain(|_, h| *h != handle);
        Some(entry)
    }

    /// Handles whose id starts with `prefix`, compared lowercased.
    pub fn find_by_prefix(&self, prefix: &str) -> Vec<ConnectionHandle> {
        let prefix = prefix.to_lowercase();
        let mut found: Vec<ConnectionHandle> = self
            .by_id
            .iter()
            .filter(|(id, _)| id.to_lowercase().starts_with(&prefix))
            .map(|(_, handle)| *handle)
            .collect();
        found.sort();
        found.dedup();
        found
    }

    pub fn handles(&self) -> Vec<ConnectionHandle> {
        let mut handles: Vec<ConnectionHandle> = self.entries.keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CardSpec, TradingStyle};

    fn entry(id: &str) -> ConnectionEntry {
        let spec = CardSpec::new("UPBIT", "BTC", "KRW", TradingStyle::DayTrading);
        ConnectionEntry::new(Card::with_temporary_id(spec, id), 1)
    }

    #[test]
    fn rebind_moves_only_the_id() {
        let mut registry = Registry::new();
        let handle = registry.allocate();
        registry.insert(handle, entry("upbit-krw-btc-aaaa0000"));

        let old = registry.rebind(handle, "upbit-krw-btc-bbbb1111").unwrap();
        assert_eq!(old, "upbit-krw-btc-aaaa0000");
        assert_eq!(registry.resolve("upbit-krw-btc-aaaa0000"), None);
        assert_eq!(registry.resolve("upbit-krw-btc-bbbb1111"), Some(handle));
        assert_eq!(registry.ids(), vec!["upbit-krw-btc-bbbb1111".to_string()]);
        assert_eq!(
            registry.get(handle).unwrap().card.temporary_id,
            "upbit-krw-btc-aaaa0000"
        );
    }

    #[test]
    fn rebind_refuses_an_id_owned_elsewhere() {
        let mut registry = Registry::new();
        let a = registry.allocate();
        registry.insert(a, entry("x-1"));
        let b = registry.allocate();
        registry.insert(b, entry("x-2"));

        assert_eq!(registry.rebind(a, "x-2"), Err(RebindError::Taken(b)));
        assert_eq!(registry.resolve("x-1"), Some(a));
        // rebinding to the id it already has is harmless
        assert_eq!(registry.rebind(b, "x-2"), Ok("x-2".to_string()));
    }

    #[test]
    fn prefix_lookup_and_removal() {
        let mut registry = Registry::new();
        let a = registry.allocate();
        registry.insert(a, entry("upbit-krw-btc-aaaa0000"));
        let b = registry.allocate();
        registry.insert(b, entry("upbit-krw-btcx-bbbb0000"));

        assert_eq!(registry.find_by_prefix("UPBIT-KRW-BTC-"), vec![a]);
        assert!(registry.remove(a).is_some());
        assert!(registry.remove(a).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("upbit-krw-btc-aaaa0000"), None);
    }
}
