mod paper_trader;
mod trade_stats;

pub use paper_trader::{OpenPosition, PaperTrader};
pub use trade_stats::TradeStats;
