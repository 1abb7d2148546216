#![allow(dead_code)]

use std::sync::Arc;

use analysis_desk::config::ManagerConfig;
use analysis_desk::data::MemoryConnector;
use analysis_desk::domain::{Card, CardSpec, TradingStyle};
use analysis_desk::engine::ConnectionManager;
use analysis_desk::ui::RecordingView;

pub const TEMP_ID: &str = "upbit-krw-btc-aaaa0000";
pub const BACKEND_ID: &str = "upbit-krw-btc-bbbb1111";

pub struct Desk {
    pub manager: ConnectionManager<RecordingView>,
    pub connector: MemoryConnector,
    pub view: RecordingView,
}

pub fn desk_with(config: ManagerConfig) -> Desk {
    let connector = MemoryConnector::new();
    let view = RecordingView::new();
    let manager = ConnectionManager::new(config, Arc::new(connector.clone()), view.clone());
    Desk {
        manager,
        connector,
        view,
    }
}

pub fn desk() -> Desk {
    desk_with(ManagerConfig::default())
}

pub fn btc_card(id: &str) -> Card {
    Card::with_temporary_id(CardSpec::new("UPBIT", "BTC", "KRW", TradingStyle::DayTrading), id)
}

pub fn eth_card(id: &str) -> Card {
    Card::with_temporary_id(CardSpec::new("UPBIT", "ETH", "KRW", TradingStyle::Swing), id)
}

pub fn card_for(exchange: &str, symbol: &str, quote: &str, id: &str) -> Card {
    Card::with_temporary_id(CardSpec::new(exchange, symbol, quote, TradingStyle::DayTrading), id)
}
