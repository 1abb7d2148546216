mod messages;
mod trade;

pub use messages::{AnalysisUpdate, ClientRequest, StartCommand, StopCommand};
pub use trade::{TradeReason, TradeRecord, TradeSide};
