use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TradingStyle;

/// Length of the random suffix of a temporary card id.
pub const SHORT_ID_LEN: usize = 8;

/// What the user asked to analyse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSpec {
    pub exchange: String,
    pub currency_pair: String,
    pub symbol: String,
    pub quote_currency: String,
    #[serde(default)]
    pub trading_style: TradingStyle,
}

impl CardSpec {
    /// Builds the spec, deriving the exchange's currency pair notation
    /// (`KRW-BTC` on Upbit, `BTCUSDT` elsewhere).
    pub fn new(exchange: &str, symbol: &str, quote_currency: &str, trading_style: TradingStyle) -> Self {
        let exchange = exchange.trim().to_uppercase();
        let symbol = symbol.trim().to_uppercase();
        let quote_currency = quote_currency.trim().to_uppercase();
        let currency_pair = Self::currency_pair_for(&exchange, &symbol, &quote_currency);
        Self {
            exchange,
            currency_pair,
            symbol,
            quote_currency,
            trading_style,
        }
    }

    pub fn currency_pair_for(exchange: &str, symbol: &str, quote_currency: &str) -> String {
        if exchange.eq_ignore_ascii_case("upbit") {
            format!("{}-{}", quote_currency, symbol)
        } else {
            format!("{}{}", symbol, quote_currency)
        }
    }

    /// `exchange-currencyPair`, lowercased. Every id of this card starts with it.
    pub fn base_id(&self) -> String {
        base_id(&self.exchange, &self.currency_pair)
    }

    pub fn is_valid(&self) -> bool {
        !self.exchange.trim().is_empty() && !self.currency_pair.trim().is_empty()
    }
}

impl std::fmt::Display for CardSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {}/{} ({})",
            self.exchange, self.symbol, self.quote_currency, self.trading_style
        )
    }
}

/// One analysis card. Lives from form submit until deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub temporary_id: String,
    pub backend_id: Option<String>,
    #[serde(flatten)]
    pub spec: CardSpec,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn new(spec: CardSpec) -> Self {
        let temporary_id = format!("{}-{}", spec.base_id(), generate_short_id());
        Self::with_temporary_id(spec, temporary_id)
    }

    pub fn with_temporary_id(spec: CardSpec, temporary_id: impl Into<String>) -> Self {
        Self {
            temporary_id: temporary_id.into(),
            backend_id: None,
            spec,
            created_at: Utc::now(),
        }
    }

    /// The id the backend knows this card by: its assigned id once there is
    /// one, the temporary id before.
    pub fn current_id(&self) -> &str {
        self.backend_id.as_deref().unwrap_or(&self.temporary_id)
    }

}

pub fn generate_short_id() -> String {
    Uuid::new_v4().simple().to_string()[..SHORT_ID_LEN].to_string()
}

pub fn base_id(exchange: &str, currency_pair: &str) -> String {
    format!("{}-{}", exchange, currency_pair).to_lowercase()
}

/// Prefix shared by every card id of an exchange/pair, including the trailing
/// separator so `binance-btc` never matches `binance-btcusdt-…`.
pub fn pair_prefix(exchange: &str, currency_pair: &str) -> String {
    format!("{}-", base_id(exchange, currency_pair))
}

/// Strips the random suffix off a card id: `upbit-krw-btc-1a2b3c4d` -> `upbit-krw-btc`.
/// `None` unless the last segment is exactly [`SHORT_ID_LEN`] hex digits.
pub fn strip_short_id(card_id: &str) -> Option<&str> {
    let (base, suffix) = card_id.rsplit_once('-')?;
    let is_short_id = suffix.len() == SHORT_ID_LEN && suffix.chars().all(|c| c.is_ascii_hexdigit());
    (is_short_id && !base.is_empty()).then_some(base)
}
