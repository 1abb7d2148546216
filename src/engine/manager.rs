use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::analysis::PaperTrader;
use crate::config::{DF, ManagerConfig, STREAM, SimulationSettings};
use crate::data::{Connector, Transport, TransportEvent};
use crate::domain::{Card, CardSpec, ConnectionHandle, SessionTag, pair_prefix, strip_short_id};
use crate::models::{AnalysisUpdate, ClientRequest, StartCommand, StopCommand};
use crate::ui::{CardControls, CardView};
use crate::utils::now_timestamp_ms;

use super::error::ManagerError;
use super::reconnect::{ConnectionStatus, LinkEvent, ReconnectPolicy};
use super::registry::{ConnectionEntry, MessageCallback, RebindError, Registry};
use super::routing::{Reconciliation, TopicKind, matches, reconcile, session_topics};

/// Action name of a stop request sent through [`ConnectionManager::send`].
pub const STOP_ANALYSIS_ACTION: &str = "stopAnalysis";

/// How a caller names the analysis to stop.
#[derive(Debug, Clone, PartialEq)]
pub enum StopTarget {
    /// Temporary or backend id.
    Id(String),
    /// Exchange and pair, optionally with the card record so its backend id
    /// can be preferred.
    Pair {
        exchange: String,
        currency_pair: String,
        card: Option<Card>,
    },
}

impl fmt::Display for StopTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopTarget::Id(id) => write!(f, "{id}"),
            StopTarget::Pair {
                exchange,
                currency_pair,
                ..
            } => write!(f, "{exchange} {currency_pair}"),
        }
    }
}

/// What is left of an analysis once its connection is gone.
pub struct StoppedAnalysis {
    pub card: Card,
    pub status: ConnectionStatus,
    pub simulation: Option<PaperTrader>,
}

/// Requests accepted by [`ConnectionManager::run`].
pub enum ManagerCommand {
    Open {
        spec: CardSpec,
        simulation: Option<SimulationSettings>,
    },
    Stop(StopTarget),
    Send(ClientRequest),
    CloseAll,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
struct RetryDue {
    handle: ConnectionHandle,
    session: u64,
}

enum Teardown {
    User,
    /// Replaced by a new analysis of the same pair.
    Restart,
    Shutdown,
    /// The backend announced the stop itself.
    BackendStop,
    Failed(ManagerError),
}

impl fmt::Display for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Teardown::User => write!(f, "stopped by user"),
            Teardown::Restart => write!(f, "restarted"),
            Teardown::Shutdown => write!(f, "shutdown"),
            Teardown::BackendStop => write!(f, "stopped by backend"),
            Teardown::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Owns every live analysis connection: opens them, reconciles backend ids,
/// routes updates to the card view and tears them down.
///
/// All registry changes happen on `&mut self` without an await between the
/// read and the write, so a remap can never interleave with another card's
/// message.
pub struct ConnectionManager<V: CardView> {
    config: ManagerConfig,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    view: V,
    registry: Registry,
    next_session: u64,
    events_tx: UnboundedSender<TransportEvent>,
    events_rx: UnboundedReceiver<TransportEvent>,
    retry_tx: UnboundedSender<RetryDue>,
    retry_rx: UnboundedReceiver<RetryDue>,
    /// Analyses torn down by errors or the backend, kept for the final summary.
    retired: Vec<StoppedAnalysis>,
}

impl<V: CardView> ConnectionManager<V> {
    pub fn new(config: ManagerConfig, connector: Arc<dyn Connector>, view: V) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let (retry_tx, retry_rx) = unbounded_channel();
        Self {
            policy: ReconnectPolicy::from_config(&config),
            config,
            connector,
            view,
            registry: Registry::new(),
            next_session: 0,
            events_tx,
            events_rx,
            retry_tx,
            retry_rx,
            retired: Vec::new(),
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    fn next_session(&mut self) -> u64 {
        self.next_session += 1;
        self.next_session
    }

    // --- Starting ---

    /// Creates a card for `spec`, renders it and starts its analysis.
    pub async fn open_card(&mut self, spec: CardSpec) -> Result<ConnectionHandle, ManagerError> {
        if !spec.is_valid() {
            let err = ManagerError::InvalidCard(spec.to_string());
            log::warn!("{err}");
            return Err(err);
        }
        let card = Card::new(spec);
        self.view.create_card(&card);
        self.start_analysis(card).await
    }

    /// Opens a connection for `card`, first stopping any live analysis of the
    /// same exchange and pair. On failure nothing stays registered and the
    /// card is left showing its retry button.
    pub async fn start_analysis(&mut self, card: Card) -> Result<ConnectionHandle, ManagerError> {
        let card_id = card.current_id().to_string();
        if !card.spec.is_valid() {
            let err = ManagerError::InvalidCard(card_id.clone());
            self.view.show_error(&card_id, &err.user_message());
            return Err(err);
        }
        if let Some(handle) = self.registry.resolve(&card_id) {
            log::info!("Analysis {} already running on {}", card_id, handle);
            return Ok(handle);
        }

        let prefix = pair_prefix(&card.spec.exchange, &card.spec.currency_pair);
        for stale in self.registry.find_by_prefix(&prefix) {
            log::info!("Restarting {}: stopping previous analysis on {}", card.spec, stale);
            if let Some(stopped) = self.teardown(stale, Teardown::Restart).await {
                self.retired.push(stopped);
            }
        }

        let handle = self.registry.allocate();
        let session = self.next_session();
        self.view.set_controls(&card_id, CardControls::CONNECTING);
        self.registry.insert(handle, ConnectionEntry::new(card, session));

        if let Err(err) = self.connect(handle).await {
            log::error!("Failed to start analysis {}: {}", card_id, err);
            if let Some(stopped) = self.teardown(handle, Teardown::Failed(err.clone())).await {
                self.retired.push(stopped);
            }
            return Err(err);
        }
        Ok(handle)
    }

    /// Opens a new transport session for `handle` and brings it to CONNECTED.
    async fn connect(&mut self, handle: ConnectionHandle) -> Result<(), ManagerError> {
        let (tag, card_id) = match self.registry.get(handle) {
            Some(entry) => (
                SessionTag {
                    handle,
                    session: entry.session,
                },
                entry.current_id().to_string(),
            ),
            None => return Err(ManagerError::UnknownCard(handle.to_string())),
        };

        let transport = self
            .connector
            .connect(tag, self.events_tx.clone())
            .await
            .map_err(|e| ManagerError::transport(&card_id, e))?;

        match self.registry.get_mut(handle) {
            Some(entry) => entry.transport = Some(transport),
            None => return Err(ManagerError::UnknownCard(card_id)),
        }

        if let Err(err) = self.on_transport_ready(handle).await {
            self.discard_transport(handle).await;
            return Err(err);
        }

        if let Some(entry) = self.registry.get_mut(handle) {
            entry.status = entry
                .status
                .next(LinkEvent::Opened)
                .unwrap_or(ConnectionStatus::Connected);
        }
        Ok(())
    }

    /// Subscribes the session's topics, then sends the start command.
    async fn on_transport_ready(&mut self, handle: ConnectionHandle) -> Result<(), ManagerError> {
        let include_common = self.config.subscribe_common_topic;
        let Some(entry) = self.registry.get_mut(handle) else {
            return Err(ManagerError::UnknownCard(handle.to_string()));
        };
        let card_id = entry.current_id().to_string();
        let Some(transport) = entry.transport.as_mut() else {
            return Err(ManagerError::transport(&card_id, "no transport attached"));
        };

        for kind in session_topics(include_common) {
            let subscription = transport
                .subscribe(&kind.destination(&card_id))
                .await
                .map_err(|e| ManagerError::transport(&card_id, e))?;
            entry.subscriptions.insert(subscription, kind);
        }

        let body = serde_json::to_string(&StartCommand::from(&entry.card)).map_err(|e| {
            ManagerError::Protocol {
                card_id: card_id.clone(),
                reason: e.to_string(),
            }
        })?;
        transport
            .publish(STREAM.topics.start_destination, &body)
            .await
            .map_err(|e| ManagerError::transport(&card_id, e))?;

        log::info!("Start command sent for {} ({})", card_id, entry.card.spec);
        Ok(())
    }

    /// Drops the transport of a connection that stays registered.
    async fn discard_transport(&mut self, handle: ConnectionHandle) {
        let Some(entry) = self.registry.get_mut(handle) else {
            return;
        };
        entry.subscriptions.clear();
        entry.streaming = false;
        if let Some(mut transport) = entry.transport.take()
            && let Err(e) = transport.close().await
        {
            log::debug!("Closing dead transport of {} failed: {:#}", handle, e);
        }
    }

    // --- Transport events ---

    pub async fn handle_event(&mut self, event: TransportEvent) {
        let tag = event.tag();
        let current = self.registry.get(tag.handle).map(|entry| entry.session);
        if current != Some(tag.session) {
            log::debug!("Ignoring event from stale session {:?}", tag);
            return;
        }

        match event {
            TransportEvent::Message {
                subscription, body, ..
            } => self.route_message(tag.handle, &subscription, &body).await,
            TransportEvent::Error { reason, .. } => {
                let card_id = self.card_id(tag.handle).unwrap_or_default().to_string();
                let err = ManagerError::transport(&card_id, reason);
                log::error!("{}", err);
                if let Some(stopped) = self.teardown(tag.handle, Teardown::Failed(err)).await {
                    self.retired.push(stopped);
                }
            }
            TransportEvent::Closed { .. } => self.on_connection_lost(tag.handle).await,
        }
    }

    async fn route_message(&mut self, handle: ConnectionHandle, subscription: &str, body: &str) {
        let Some(entry) = self.registry.get(handle) else {
            return;
        };
        let card_id = entry.current_id().to_string();
        let Some(kind) = entry.subscriptions.get(subscription).copied() else {
            log::debug!("Dropping message for {} on unknown subscription {}", card_id, subscription);
            return;
        };

        let update = match AnalysisUpdate::parse(body) {
            Ok(update) => update,
            Err(e) => {
                let err = ManagerError::Protocol {
                    card_id,
                    reason: e.to_string(),
                };
                log::warn!("{}", err);
                return;
            }
        };
        let belongs = kind != TopicKind::Common || matches(&entry.card.spec, &update);
        let reconciliation = reconcile(&entry.card, &update);

        match kind {
            TopicKind::Stop => {
                log::info!(
                    "Backend stopped {}: {}",
                    card_id,
                    update.message.as_deref().unwrap_or("no reason given")
                );
                if let Some(stopped) = self.teardown(handle, Teardown::BackendStop).await {
                    self.retired.push(stopped);
                }
            }
            TopicKind::Error => {
                let reason = update
                    .error
                    .or(update.message)
                    .unwrap_or_else(|| "Analysis failed".to_string());
                self.fail_application(handle, card_id, reason).await;
            }
            _ if !belongs => {
                if DF.log_routing {
                    log::debug!("Common-topic update not for {}, skipped", card_id);
                }
            }
            _ => {
                if let Some(reason) = update.error.clone() {
                    self.fail_application(handle, card_id, reason).await;
                    return;
                }
                if kind != TopicKind::Common
                    && let Reconciliation::Remap { to } = reconciliation
                {
                    self.remap(handle, &to).await;
                }
                self.dispatch(handle, &update);
            }
        }
    }

    /// Points the connection at the backend-assigned id and follows its topic.
    async fn remap(&mut self, handle: ConnectionHandle, new_id: &str) {
        let old_id = match self.registry.rebind(handle, new_id) {
            Ok(old_id) => old_id,
            Err(RebindError::Taken(owner)) => {
                log::warn!("Backend id {} already belongs to {}, keeping current id", new_id, owner);
                return;
            }
            Err(RebindError::UnknownHandle) => return,
        };
        self.view.rekey_card(&old_id, new_id);
        if DF.log_reconciliation {
            log::info!("Reconciled card id {} -> {}", old_id, new_id);
        }

        let Some(entry) = self.registry.get_mut(handle) else {
            return;
        };
        let Some(transport) = entry.transport.as_mut() else {
            return;
        };
        match transport.subscribe(&TopicKind::Backend.destination(new_id)).await {
            Ok(subscription) => {
                entry.subscriptions.insert(subscription, TopicKind::Backend);
            }
            Err(e) => log::warn!("Could not subscribe to backend topic of {}: {:#}", new_id, e),
        }
    }

    fn dispatch(&mut self, handle: ConnectionHandle, update: &AnalysisUpdate) {
        let Some(entry) = self.registry.get_mut(handle) else {
            return;
        };
        let card_id = entry.current_id().to_string();
        if !entry.streaming {
            entry.streaming = true;
            self.view.set_controls(&card_id, CardControls::STREAMING);
        }

        match entry.callback.as_mut() {
            Some(callback) => callback(&card_id, update),
            None => self.view.update_card(&card_id, update),
        }
        if DF.log_routing {
            log::debug!(
                "Routed update for {} to {}",
                card_id,
                if entry.callback.is_some() { "callback" } else { "card view" }
            );
        }

        if let Some(trader) = entry.simulation.as_mut() {
            let now_ms = update.timestamp.unwrap_or_else(now_timestamp_ms);
            if let Some(trade) = trader.on_update(update, now_ms) {
                self.view.record_trade(&card_id, &trade);
            }
        }
    }

    async fn fail_application(&mut self, handle: ConnectionHandle, card_id: String, reason: String) {
        let err = ManagerError::Application { card_id, reason };
        log::error!("{}", err);
        if let Some(stopped) = self.teardown(handle, Teardown::Failed(err)).await {
            self.retired.push(stopped);
        }
    }

    // --- Reconnection ---

    async fn on_connection_lost(&mut self, handle: ConnectionHandle) {
        self.discard_transport(handle).await;
        let policy = self.policy;
        let Some(entry) = self.registry.get_mut(handle) else {
            return;
        };
        let card_id = entry.current_id().to_string();

        match policy.next_delay(entry.reconnect_attempts) {
            Some(delay) => {
                entry.status = entry
                    .status
                    .next(LinkEvent::Lost)
                    .unwrap_or(ConnectionStatus::Reconnecting);
                entry.reconnect_attempts += 1;
                let attempt = entry.reconnect_attempts;
                let session = entry.session;
                log::warn!(
                    "Connection for {} lost, reconnecting in {:?} (attempt {}/{})",
                    card_id,
                    delay,
                    attempt,
                    policy.max_attempts
                );
                self.view.set_controls(&card_id, CardControls::CONNECTING);
                self.schedule_retry(RetryDue { handle, session }, delay);
            }
            None => {
                let err = ManagerError::transport(
                    &card_id,
                    format!("connection lost after {} reconnect attempts", entry.reconnect_attempts),
                );
                log::error!("{}", err);
                if let Some(stopped) = self.teardown(handle, Teardown::Failed(err)).await {
                    self.retired.push(stopped);
                }
            }
        }
    }

    fn schedule_retry(&self, due: RetryDue, delay: Duration) {
        let retry_tx = self.retry_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = retry_tx.send(due);
        });
    }

    async fn handle_retry_due(&mut self, due: RetryDue) {
        let pending = self
            .registry
            .get(due.handle)
            .is_some_and(|e| e.session == due.session && e.status == ConnectionStatus::Reconnecting);
        if !pending {
            return;
        }

        let session = self.next_session();
        let Some(entry) = self.registry.get_mut(due.handle) else {
            return;
        };
        entry.status = entry
            .status
            .next(LinkEvent::RetryDue)
            .unwrap_or(ConnectionStatus::Connecting);
        entry.session = session;
        let card_id = entry.current_id().to_string();
        let attempt = entry.reconnect_attempts;

        log::info!("Reconnecting {} (attempt {})", card_id, attempt);
        match self.connect(due.handle).await {
            Ok(()) => {
                if let Some(entry) = self.registry.get_mut(due.handle) {
                    entry.reconnect_attempts = 0;
                }
                log::info!("Reconnected {}", card_id);
            }
            Err(err) => {
                log::warn!("Reconnect attempt {} for {} failed: {}", attempt, card_id, err);
                self.on_connection_lost(due.handle).await;
            }
        }
    }

    // --- Stopping ---

    /// Stops the analysis named by `target`. Resolution order: exact id, then
    /// `exchange-currencyPair` prefix. A miss is logged and ignored, so
    /// stopping twice is harmless.
    pub async fn stop_analysis(&mut self, target: StopTarget) -> Option<StoppedAnalysis> {
        let Some(handle) = self.resolve_target(&target) else {
            log::info!("{}", ManagerError::UnknownCard(target.to_string()));
            return None;
        };
        self.teardown(handle, Teardown::User).await
    }

    /// Stops the analysis and removes its card from the view.
    pub async fn delete_card(&mut self, card_id: &str) -> Option<StoppedAnalysis> {
        let stopped = self.stop_analysis(StopTarget::Id(card_id.to_string())).await;
        let current = stopped
            .as_ref()
            .map(|s| s.card.current_id().to_string())
            .unwrap_or_else(|| card_id.to_string());
        self.view.delete_card(&current);
        stopped
    }

    /// Stops every connection. A failure on one does not keep the others open.
    pub async fn close_all_connections(&mut self) -> Vec<StoppedAnalysis> {
        let mut stopped = Vec::new();
        for handle in self.registry.handles() {
            stopped.extend(self.teardown(handle, Teardown::Shutdown).await);
        }
        log::info!("Closed {} connection(s)", stopped.len());
        stopped
    }

    /// Entry point for generic client requests. Only `stopAnalysis` is known.
    pub async fn send(&mut self, request: ClientRequest) -> Option<StoppedAnalysis> {
        if request.action != STOP_ANALYSIS_ACTION {
            log::warn!("Ignoring unsupported request action '{}'", request.action);
            return None;
        }
        let target = match (request.card_id, request.exchange, request.currency_pair) {
            (Some(card_id), _, _) => StopTarget::Id(card_id),
            (None, Some(exchange), Some(currency_pair)) => StopTarget::Pair {
                exchange,
                currency_pair,
                card: None,
            },
            _ => {
                log::warn!("stopAnalysis request names neither a card id nor an exchange and pair");
                return None;
            }
        };
        self.stop_analysis(target).await
    }

    fn resolve_target(&self, target: &StopTarget) -> Option<ConnectionHandle> {
        let by_prefix = |prefix: String| self.registry.find_by_prefix(&prefix).into_iter().next();
        match target {
            StopTarget::Id(id) => self
                .registry
                .resolve(id)
                .or_else(|| by_prefix(format!("{}-", strip_short_id(id).unwrap_or(id)))),
            StopTarget::Pair {
                exchange,
                currency_pair,
                card,
            } => card
                .as_ref()
                .and_then(|card| {
                    card.backend_id
                        .as_deref()
                        .and_then(|id| self.registry.resolve(id))
                        .or_else(|| self.registry.resolve(&card.temporary_id))
                })
                .or_else(|| by_prefix(pair_prefix(exchange, currency_pair))),
        }
    }

    /// Removes the connection first, so nothing more is dispatched for it,
    /// then releases its broker resources best-effort.
    async fn teardown(&mut self, handle: ConnectionHandle, reason: Teardown) -> Option<StoppedAnalysis> {
        let mut entry = self.registry.remove(handle)?;
        let card_id = entry.current_id().to_string();
        let failed = matches!(reason, Teardown::Failed(_));

        if let Teardown::Failed(err) = &reason {
            self.view.show_error(&card_id, &err.user_message());
        }
        let publish_stop = match &reason {
            Teardown::BackendStop => false,
            Teardown::Failed(err) => matches!(err, ManagerError::Application { .. }),
            _ => true,
        };

        if let Some(mut transport) = entry.transport.take() {
            if transport.is_open() {
                if publish_stop {
                    publish_stop_command(&mut *transport, &entry.card).await;
                }
                for subscription in entry.subscriptions.keys() {
                    if let Err(e) = transport.unsubscribe(subscription).await {
                        log::warn!("Unsubscribe {} of {} failed: {:#}", subscription, card_id, e);
                    }
                }
            }
            if let Err(e) = transport.close().await {
                log::warn!("Closing connection of {} failed: {:#}", card_id, e);
            }
        }
        entry.subscriptions.clear();

        let event = if failed { LinkEvent::Failed } else { LinkEvent::Stopped };
        entry.status = entry.status.next(event).unwrap_or(entry.status);
        let controls = if failed { CardControls::RETRY } else { CardControls::IDLE };
        self.view.set_controls(&card_id, controls);

        log::info!("Analysis {} ended: {}", card_id, reason);
        Some(StoppedAnalysis {
            card: entry.card,
            status: entry.status,
            simulation: entry.simulation,
        })
    }

    // --- Callbacks and simulation ---

    /// Routes updates for `card_id` to `callback` instead of the card view.
    pub fn on_message(&mut self, card_id: &str, callback: MessageCallback) -> bool {
        match self.entry_mut(card_id) {
            Some(entry) => {
                entry.callback = Some(callback);
                true
            }
            None => false,
        }
    }

    pub fn enable_simulation(&mut self, card_id: &str, settings: SimulationSettings) -> bool {
        match self.entry_mut(card_id) {
            Some(entry) => {
                entry.simulation = Some(PaperTrader::new(settings));
                true
            }
            None => false,
        }
    }

    pub fn disable_simulation(&mut self, card_id: &str) -> Option<PaperTrader> {
        self.entry_mut(card_id)?.simulation.take()
    }

    pub fn set_signal_threshold(&mut self, card_id: &str, threshold: f64) -> bool {
        match self.entry_mut(card_id).and_then(|e| e.simulation.as_mut()) {
            Some(trader) => {
                trader.set_signal_threshold(threshold);
                true
            }
            None => false,
        }
    }

    pub fn simulation(&self, card_id: &str) -> Option<&PaperTrader> {
        self.entry(card_id)?.simulation.as_ref()
    }

    // --- Queries ---

    fn entry(&self, card_id: &str) -> Option<&ConnectionEntry> {
        self.registry.resolve(card_id).and_then(|h| self.registry.get(h))
    }

    fn entry_mut(&mut self, card_id: &str) -> Option<&mut ConnectionEntry> {
        self.registry.resolve(card_id).and_then(|h| self.registry.get_mut(h))
    }

    /// Current id of the connection behind `handle`.
    pub fn card_id(&self, handle: ConnectionHandle) -> Option<&str> {
        self.registry.get(handle).map(|e| e.current_id())
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.entry(card_id).map(|e| &e.card)
    }

    pub fn status(&self, card_id: &str) -> Option<ConnectionStatus> {
        self.entry(card_id).map(|e| e.status)
    }

    pub fn subscription_count(&self, card_id: &str) -> usize {
        self.entry(card_id).map_or(0, |e| e.subscriptions.len())
    }

    pub fn has_callback(&self, card_id: &str) -> bool {
        self.entry(card_id).is_some_and(|e| e.callback.is_some())
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Analyses ended by errors, restarts or the backend since the last call.
    pub fn take_retired(&mut self) -> Vec<StoppedAnalysis> {
        std::mem::take(&mut self.retired)
    }

    // --- Driving ---

    /// Handles every queued transport event and due retry without waiting.
    pub async fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        loop {
            if let Ok(event) = self.events_rx.try_recv() {
                self.handle_event(event).await;
            } else if let Ok(due) = self.retry_rx.try_recv() {
                self.handle_retry_due(due).await;
            } else {
                break;
            }
            processed += 1;
        }
        processed
    }

    async fn apply(&mut self, command: ManagerCommand, finished: &mut Vec<StoppedAnalysis>) {
        match command {
            ManagerCommand::Open { spec, simulation } => match self.open_card(spec).await {
                Ok(handle) => {
                    if let Some(settings) = simulation
                        && let Some(card_id) = self.card_id(handle).map(str::to_string)
                    {
                        self.enable_simulation(&card_id, settings);
                    }
                }
                Err(err) => log::warn!("Could not open card: {}", err),
            },
            ManagerCommand::Stop(target) => finished.extend(self.stop_analysis(target).await),
            ManagerCommand::Send(request) => finished.extend(self.send(request).await),
            ManagerCommand::CloseAll => finished.extend(self.close_all_connections().await),
            ManagerCommand::Shutdown => {}
        }
    }

    /// Event loop. Runs until `Shutdown` arrives or every command sender is
    /// gone, then closes all connections and returns every analysis that ended.
    pub async fn run(mut self, mut commands: UnboundedReceiver<ManagerCommand>) -> Vec<StoppedAnalysis> {
        let mut finished = Vec::new();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ManagerCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command, &mut finished).await,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
                Some(due) = self.retry_rx.recv() => self.handle_retry_due(due).await,
            }
            finished.extend(self.take_retired());
        }
        finished.extend(self.close_all_connections().await);
        finished.extend(self.take_retired());
        finished
    }
}

async fn publish_stop_command(transport: &mut dyn Transport, card: &Card) {
    match serde_json::to_string(&StopCommand::from(card)) {
        Ok(body) => {
            if let Err(e) = transport.publish(STREAM.topics.stop_destination, &body).await {
                log::warn!("Stop command for {} not sent: {:#}", card.current_id(), e);
            }
        }
        Err(e) => log::warn!("Stop command for {} not encoded: {}", card.current_id(), e),
    }
}
