//! Topic naming, the common-topic filter, and id reconciliation decisions.

use crate::config::STREAM;
use crate::domain::{Card, CardSpec};
use crate::models::AnalysisUpdate;

/// What a subscription on a connection listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// `/topic/analysis.{id}` for the id the session started with.
    Card,
    /// `/topic/analysis.{backendId}`, added after reconciliation.
    Backend,
    /// Shared `/topic/analysis`, filtered with [`matches`].
    Common,
    /// Backend-initiated stop notice.
    Stop,
    /// Backend error notice, `{cardId, error}`.
    Error,
}

impl TopicKind {
    pub fn destination(self, card_id: &str) -> String {
        match self {
            TopicKind::Card | TopicKind::Backend => format!("{}.{}", STREAM.topics.analysis, card_id),
            TopicKind::Common => STREAM.topics.analysis.to_string(),
            TopicKind::Stop => format!("{}.{}", STREAM.topics.stop, card_id),
            TopicKind::Error => format!("{}.{}", STREAM.topics.error, card_id),
        }
    }
}

/// Topics opened as soon as a session is ready.
pub fn session_topics(include_common: bool) -> Vec<TopicKind> {
    let mut kinds = vec![TopicKind::Card, TopicKind::Stop, TopicKind::Error];
    if include_common {
        kinds.push(TopicKind::Common);
    }
    kinds
}

/// Whether an update on the shared topic belongs to this card: no card id,
/// exchange and currency pair both present and equal, ignoring case. An update
/// naming a card id also reaches that card's own topic, or belongs to another
/// card, so it is never taken from the shared topic.
pub fn matches(card: &CardSpec, update: &AnalysisUpdate) -> bool {
    if update.card_id.as_deref().is_some_and(|id| !id.trim().is_empty()) {
        return false;
    }
    let same = |ours: &str, theirs: Option<&str>| {
        theirs.is_some_and(|theirs| ours.trim().eq_ignore_ascii_case(theirs.trim()))
    };
    same(&card.exchange, update.exchange.as_deref())
        && same(&card.currency_pair, update.currency_pair.as_deref())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    Remap { to: String },
}

/// Decides whether `update` carries a new backend id for `card`. A late update
/// still echoing the temporary id never undoes a reconciliation.
pub fn reconcile(card: &Card, update: &AnalysisUpdate) -> Reconciliation {
    match update.card_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() && id != card.current_id() && id != card.temporary_id => {
            Reconciliation::Remap { to: id.to_string() }
        }
        _ => Reconciliation::Unchanged,
    }
}
