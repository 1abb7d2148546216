use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TradeReason {
    #[strum(to_string = "Signal")]
    BuySignal,
    #[strum(to_string = "Take profit")]
    TakeProfit,
    #[strum(to_string = "Stop loss")]
    StopLoss,
    #[strum(to_string = "Sell signal")]
    SellSignal,
}

/// One entry of the append-only simulated trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub timestamp_ms: i64,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    /// Cash balance right after the trade
    pub balance_after: f64,
    /// Only set on sells
    pub profit_percent: Option<f64>,
    pub reason: TradeReason,
}

impl TradeRecord {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}
