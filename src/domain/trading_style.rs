use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Indicator weighting profile the backend applies to a card.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum TradingStyle {
    Scalping,
    #[default]
    DayTrading,
    Swing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wire_names_match_backend() {
        assert_eq!(TradingStyle::DayTrading.to_string(), "dayTrading");
        assert_eq!(
            serde_json::to_string(&TradingStyle::Scalping).unwrap(),
            "\"scalping\""
        );
        assert_eq!(TradingStyle::from_str("SWING").unwrap(), TradingStyle::Swing);
        assert_eq!(TradingStyle::from_str("daytrading").unwrap(), TradingStyle::DayTrading);
        assert!(TradingStyle::from_str("hodl").is_err());
    }
}
