use crate::domain::Card;
use crate::models::{AnalysisUpdate, TradeRecord};

/// Visibility of a card's buttons and loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardControls {
    pub start_visible: bool,
    pub stop_visible: bool,
    pub retry_visible: bool,
    pub loading: bool,
}

impl CardControls {
    pub const CONNECTING: CardControls = CardControls {
        start_visible: false,
        stop_visible: true,
        retry_visible: false,
        loading: true,
    };

    pub const STREAMING: CardControls = CardControls {
        start_visible: false,
        stop_visible: true,
        retry_visible: false,
        loading: false,
    };

    pub const IDLE: CardControls = CardControls {
        start_visible: true,
        stop_visible: false,
        retry_visible: false,
        loading: false,
    };

    pub const RETRY: CardControls = CardControls {
        start_visible: false,
        stop_visible: false,
        retry_visible: true,
        loading: false,
    };
}

/// Renders cards. The Manager calls this with the card's current id and never
/// draws anything itself.
pub trait CardView {
    fn create_card(&mut self, card: &Card);

    fn update_card(&mut self, card_id: &str, update: &AnalysisUpdate);

    fn show_error(&mut self, card_id: &str, message: &str);

    fn delete_card(&mut self, card_id: &str);

    fn set_controls(&mut self, card_id: &str, controls: CardControls);

    /// The backend assigned `new_id`; anything the view keys by `old_id` moves.
    fn rekey_card(&mut self, old_id: &str, new_id: &str);

    fn record_trade(&mut self, _card_id: &str, _trade: &TradeRecord) {}
}
