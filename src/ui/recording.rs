use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::Card;
use crate::models::{AnalysisUpdate, TradeRecord};

use super::{CardControls, CardView};

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Created { card_id: String },
    Updated { card_id: String, update: AnalysisUpdate },
    Error { card_id: String, message: String },
    Deleted { card_id: String },
    Controls { card_id: String, controls: CardControls },
    Rekeyed { old_id: String, new_id: String },
    Trade { card_id: String, trade: TradeRecord },
}

/// A `CardView` that only records what it was asked to do. Clones share the
/// same log, so one copy can go to the Manager and another stay with the caller.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    calls: Arc<Mutex<Vec<ViewCall>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<ViewCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.log().clone()
    }

    pub fn updates_for(&self, card_id: &str) -> Vec<AnalysisUpdate> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                ViewCall::Updated { card_id: id, update } if id == card_id => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors_for(&self, card_id: &str) -> Vec<String> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                ViewCall::Error { card_id: id, message } if id == card_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_controls(&self, card_id: &str) -> Option<CardControls> {
        self.log().iter().rev().find_map(|call| match call {
            ViewCall::Controls { card_id: id, controls } if id == card_id => Some(*controls),
            _ => None,
        })
    }

    pub fn trades(&self) -> Vec<TradeRecord> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                ViewCall::Trade { trade, .. } => Some(trade.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn rekeys(&self) -> Vec<(String, String)> {
        self.log()
            .iter()
            .filter_map(|call| match call {
                ViewCall::Rekeyed { old_id, new_id } => Some((old_id.clone(), new_id.clone())),
                _ => None,
            })
            .collect()
    }
}

impl CardView for RecordingView {
    fn create_card(&mut self, card: &Card) {
        self.log().push(ViewCall::Created {
            card_id: card.current_id().to_string(),
        });
    }

    fn update_card(&mut self, card_id: &str, update: &AnalysisUpdate) {
        self.log().push(ViewCall::Updated {
            card_id: card_id.to_string(),
            update: update.clone(),
        });
    }

    fn show_error(&mut self, card_id: &str, message: &str) {
        self.log().push(ViewCall::Error {
            card_id: card_id.to_string(),
            message: message.to_string(),
        });
    }

    fn delete_card(&mut self, card_id: &str) {
        self.log().push(ViewCall::Deleted {
            card_id: card_id.to_string(),
        });
    }

    fn set_controls(&mut self, card_id: &str, controls: CardControls) {
        self.log().push(ViewCall::Controls {
            card_id: card_id.to_string(),
            controls,
        });
    }

    fn rekey_card(&mut self, old_id: &str, new_id: &str) {
        self.log().push(ViewCall::Rekeyed {
            old_id: old_id.to_string(),
            new_id: new_id.to_string(),
        });
    }

    fn record_trade(&mut self, card_id: &str, trade: &TradeRecord) {
        self.log().push(ViewCall::Trade {
            card_id: card_id.to_string(),
            trade: trade.clone(),
        });
    }
}
