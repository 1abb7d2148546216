//! Line-per-event terminal rendering of cards, plus tables for the simulation
//! summary.

use std::collections::HashMap;

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::analysis::TradeStats;
use crate::domain::Card;
use crate::models::{AnalysisUpdate, TradeRecord};
use crate::utils::epoch_ms_to_time_string;

use super::{CardControls, CardView};

#[derive(Default)]
pub struct TerminalView {
    /// Display label per current card id
    labels: HashMap<String, String>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    fn label<'a>(&'a self, card_id: &'a str) -> &'a str {
        self.labels.get(card_id).map(String::as_str).unwrap_or(card_id)
    }
}

impl CardView for TerminalView {
    fn create_card(&mut self, card: &Card) {
        let label = card.spec.to_string();
        println!("+ {label}  [{}]", card.current_id());
        self.labels.insert(card.current_id().to_string(), label);
    }

    fn update_card(&mut self, card_id: &str, update: &AnalysisUpdate) {
        println!("{}", format_update(self.label(card_id), update));
    }

    fn show_error(&mut self, card_id: &str, message: &str) {
        println!("! {}: {message}", self.label(card_id));
    }

    fn delete_card(&mut self, card_id: &str) {
        if let Some(label) = self.labels.remove(card_id) {
            println!("- {label}");
        }
    }

    fn set_controls(&mut self, card_id: &str, controls: CardControls) {
        let state = match controls {
            CardControls::CONNECTING => "connecting...",
            CardControls::RETRY => "stopped (retry available)",
            CardControls::IDLE => "stopped",
            _ => return,
        };
        println!("  {}: {state}", self.label(card_id));
    }

    fn rekey_card(&mut self, old_id: &str, new_id: &str) {
        if let Some(label) = self.labels.remove(old_id) {
            self.labels.insert(new_id.to_string(), label);
        }
    }

    fn record_trade(&mut self, card_id: &str, trade: &TradeRecord) {
        let profit = trade
            .profit_percent
            .map(|p| format!(" ({p:+.2}%)"))
            .unwrap_or_default();
        println!(
            "  $ {} {} {:.6} @ {:.2}{profit}  [{}]",
            self.label(card_id),
            trade.side,
            trade.quantity,
            trade.price,
            trade.reason
        );
    }
}

pub fn format_update(label: &str, update: &AnalysisUpdate) -> String {
    if !update.has_price() {
        return format!(
            "  {label}: {}",
            update.message.as_deref().unwrap_or("waiting for data")
        );
    }
    format!(
        "  {label}: {:.2} ({:+.2}%) {} strength {:.1} | SMA {} | RSI {:.1} {} | BB {} | vol {:+.1}% | {}",
        update.current_price,
        update.price_change_percent,
        update.analysis_result.as_deref().unwrap_or("-"),
        update.buy_signal_strength,
        update.sma_signal.as_deref().unwrap_or("-"),
        update.rsi_value,
        update.rsi_signal.as_deref().unwrap_or("-"),
        update.bollinger_signal.as_deref().unwrap_or("-"),
        update.volume_change_percent,
        update.market_condition.as_deref().unwrap_or("-"),
    )
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn render_summary(stats: &TradeStats) -> String {
    let rows = vec![
        StatRow { metric: "Trades", value: stats.total_trades.to_string() },
        StatRow { metric: "Round trips", value: stats.completed_trades.to_string() },
        StatRow { metric: "Wins / losses", value: format!("{} / {}", stats.wins, stats.losses) },
        StatRow { metric: "Win rate", value: format!("{:.1}%", stats.win_rate) },
        StatRow { metric: "Average profit", value: format!("{:+.2}%", stats.average_profit_pct) },
        StatRow { metric: "Best trade", value: format!("{:+.2}%", stats.max_profit_pct) },
        StatRow { metric: "Worst trade", value: format!("{:+.2}%", stats.max_loss_pct) },
        StatRow { metric: "Total return", value: format!("{:+.2}%", stats.total_return_pct) },
    ];
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct TradeRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Side")]
    side: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Qty")]
    quantity: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "P/L")]
    profit: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

pub fn render_trades(trades: &[TradeRecord]) -> String {
    let rows = trades.iter().map(|t| TradeRow {
        time: epoch_ms_to_time_string(t.timestamp_ms),
        side: t.side.to_string(),
        price: format!("{:.2}", t.price),
        quantity: format!("{:.6}", t.quantity),
        balance: format!("{:.0}", t.balance_after),
        profit: t.profit_percent.map(|p| format!("{p:+.2}%")).unwrap_or_default(),
        reason: t.reason.to_string(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TradeReason, TradeSide};

    #[test]
    fn summary_table_lists_every_metric() {
        let stats = TradeStats {
            total_trades: 2,
            completed_trades: 1,
            wins: 1,
            win_rate: 100.0,
            average_profit_pct: 2.0,
            max_profit_pct: 2.0,
            total_return_pct: 0.6,
            ..Default::default()
        };
        let table = render_summary(&stats);
        assert!(table.contains("Win rate"));
        assert!(table.contains("100.0%"));
        assert!(table.contains("+0.60%"));
    }

    #[test]
    fn trade_table_and_update_line() {
        let trade = TradeRecord {
            timestamp_ms: 0,
            side: TradeSide::Sell,
            price: 102.0,
            quantity: 3000.0,
            balance_after: 1_006_000.0,
            profit_percent: Some(2.0),
            reason: TradeReason::TakeProfit,
        };
        let table = render_trades(&[trade]);
        assert!(table.contains("SELL"));
        assert!(table.contains("Take profit"));

        let waiting = AnalysisUpdate {
            message: Some("Waiting for data".to_string()),
            ..Default::default()
        };
        assert!(format_update("BTC", &waiting).ends_with("Waiting for data"));
    }
}
