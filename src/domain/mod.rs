// Domain types and value objects
mod card;
mod handle;
mod trading_style;

pub use card::{
    Card, CardSpec, SHORT_ID_LEN, base_id, generate_short_id, pair_prefix, strip_short_id,
};
pub use handle::{ConnectionHandle, SessionTag};
pub use trading_style::TradingStyle;
