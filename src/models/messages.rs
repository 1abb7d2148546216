use serde::{Deserialize, Serialize};

use crate::domain::{Card, TradingStyle};

/// Sent to `/app/analysis.start` once the transport is up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCommand {
    pub exchange: String,
    pub currency_pair: String,
    pub symbol: String,
    pub quote_currency: String,
    pub trading_style: TradingStyle,
    /// Echoed back by the backend, which is how reconciliation starts.
    pub card_id: String,
}

impl From<&Card> for StartCommand {
    fn from(card: &Card) -> Self {
        Self {
            exchange: card.spec.exchange.clone(),
            currency_pair: card.spec.currency_pair.clone(),
            symbol: card.spec.symbol.clone(),
            quote_currency: card.spec.quote_currency.clone(),
            trading_style: card.spec.trading_style,
            card_id: card.current_id().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCommand {
    pub exchange: String,
    pub currency_pair: String,
    pub card_id: String,
}

impl From<&Card> for StopCommand {
    fn from(card: &Card) -> Self {
        Self {
            exchange: card.spec.exchange.clone(),
            currency_pair: card.spec.currency_pair.clone(),
            card_id: card.current_id().to_string(),
        }
    }
}

/// Inbound analysis update. Every field is optional on the wire: the initial
/// "waiting for data" message, error payloads and stop notices all reuse it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisUpdate {
    pub card_id: Option<String>,
    pub exchange: Option<String>,
    pub currency_pair: Option<String>,
    pub symbol: Option<String>,
    pub quote_currency: Option<String>,
    pub current_price: f64,
    pub price_change_percent: f64,
    pub analysis_result: Option<String>,
    pub buy_signal_strength: f64,
    pub sma_signal: Option<String>,
    pub rsi_value: f64,
    pub rsi_signal: Option<String>,
    pub bollinger_signal: Option<String>,
    pub volume_change_percent: f64,
    pub market_condition: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub timestamp: Option<i64>,
}

impl AnalysisUpdate {
    pub fn parse(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// True when the backend explicitly recommends selling.
    pub fn is_sell_signal(&self) -> bool {
        matches!(
            self.analysis_result.as_deref().map(str::to_ascii_uppercase).as_deref(),
            Some("SELL") | Some("STRONG_SELL")
        )
    }

    pub fn has_price(&self) -> bool {
        self.current_price.is_finite() && self.current_price > 0.0
    }
}

/// Generic request shape accepted by [`crate::engine::ConnectionManager::send`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientRequest {
    pub action: String,
    pub card_id: Option<String>,
    pub exchange: Option<String>,
    pub currency_pair: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CardSpec;

    #[test]
    fn start_command_uses_camel_case_and_current_id() {
        let spec = CardSpec::new("UPBIT", "BTC", "KRW", TradingStyle::Scalping);
        let mut card = Card::with_temporary_id(spec, "upbit-krw-btc-0000aaaa");
        let json = serde_json::to_value(StartCommand::from(&card)).unwrap();
        assert_eq!(json["currencyPair"], "KRW-BTC");
        assert_eq!(json["quoteCurrency"], "KRW");
        assert_eq!(json["tradingStyle"], "scalping");
        assert_eq!(json["cardId"], "upbit-krw-btc-0000aaaa");

        card.backend_id = Some("upbit-krw-btc-ffff9999".into());
        assert_eq!(StopCommand::from(&card).card_id, "upbit-krw-btc-ffff9999");
    }

    #[test]
    fn partial_payloads_parse() {
        let err = AnalysisUpdate::parse(r#"{"cardId":"x-1","error":"infrastructure not ready"}"#)
            .unwrap();
        assert_eq!(err.card_id.as_deref(), Some("x-1"));
        assert_eq!(err.error.as_deref(), Some("infrastructure not ready"));
        assert_eq!(err.current_price, 0.0);
        assert!(!err.has_price());

        let full = AnalysisUpdate::parse(
            r#"{"cardId":"b","currentPrice":101.5,"buySignalStrength":72.0,
                "analysisResult":"strong_sell","rsiValue":28.1,"marketCondition":"OVERSOLD"}"#,
        )
        .unwrap();
        assert!(full.is_sell_signal());
        assert!(full.has_price());
        assert_eq!(full.market_condition.as_deref(), Some("OVERSOLD"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(AnalysisUpdate::parse("not json").is_err());
        assert!(AnalysisUpdate::parse(r#"{"currentPrice":"abc"}"#).is_err());
    }
}
