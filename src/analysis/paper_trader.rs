use crate::config::{DF, SimulationSettings};
use crate::models::{AnalysisUpdate, TradeReason, TradeRecord, TradeSide};

use super::TradeStats;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub quantity: f64,
    pub opened_at_ms: i64,
}

impl OpenPosition {
    pub fn profit_percent(&self, price: f64) -> f64 {
        (price / self.entry_price - 1.0) * 100.0
    }
}

/// Rule-driven long-only trade simulation for one card.
///
/// Pure bookkeeping: every call to [`PaperTrader::evaluate`] maps
/// (price, signal) to at most one new trade.
#[derive(Debug, Clone)]
pub struct PaperTrader {
    settings: SimulationSettings,
    balance: f64,
    position: Option<OpenPosition>,
    trades: Vec<TradeRecord>,
    last_trade_ms: Option<i64>,
    skipped_signals: usize,
}

impl PaperTrader {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            balance: settings.initial_balance,
            settings,
            position: None,
            trades: Vec::new(),
            last_trade_ms: None,
            skipped_signals: 0,
        }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn position(&self) -> Option<&OpenPosition> {
        self.position.as_ref()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Buy signals over the threshold that arrived during the cooldown.
    pub fn skipped_signals(&self) -> usize {
        self.skipped_signals
    }

    /// Cash plus the open position marked at `mark_price`.
    pub fn equity(&self, mark_price: f64) -> f64 {
        self.balance + self.position.map_or(0.0, |p| p.quantity * mark_price)
    }

    pub fn set_signal_threshold(&mut self, threshold: f64) {
        self.settings.signal_threshold = threshold;
    }

    pub fn stats(&self) -> TradeStats {
        let mark = self.position.map_or(0.0, |p| p.entry_price);
        TradeStats::from_trades(&self.trades, self.settings.initial_balance, self.equity(mark))
    }

    /// Feeds one analysis update through the rules.
    pub fn on_update(&mut self, update: &AnalysisUpdate, now_ms: i64) -> Option<TradeRecord> {
        if !update.has_price() {
            return None;
        }
        self.evaluate(
            update.current_price,
            update.buy_signal_strength,
            update.is_sell_signal(),
            now_ms,
        )
        .cloned()
    }

    pub fn evaluate(
        &mut self,
        price: f64,
        signal_strength: f64,
        sell_signal: bool,
        now_ms: i64,
    ) -> Option<&TradeRecord> {
        if !price.is_finite() || price <= 0.0 {
            return None;
        }

        match self.position {
            None => {
                if signal_strength < self.settings.signal_threshold {
                    return None;
                }
                if !self.cooldown_elapsed(now_ms) {
                    self.skipped_signals += 1;
                    if DF.log_simulation_events {
                        log::info!(
                            "[sim] skipped buy signal {:.1} @ {:.4}: cooldown",
                            signal_strength,
                            price
                        );
                    }
                    return None;
                }
                self.open(price, now_ms)
            }
            Some(position) => {
                let profit_pct = position.profit_percent(price);
                let reason = if profit_pct >= self.settings.take_profit_pct {
                    TradeReason::TakeProfit
                } else if profit_pct <= -self.settings.stop_loss_pct {
                    TradeReason::StopLoss
                } else if sell_signal && signal_strength < self.settings.signal_threshold / 2.0 {
                    TradeReason::SellSignal
                } else {
                    return None;
                };
                self.close(price, profit_pct, reason, now_ms)
            }
        }
    }

    fn cooldown_elapsed(&self, now_ms: i64) -> bool {
        let cooldown_ms = self.settings.cooldown.as_millis() as i64;
        self.last_trade_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= cooldown_ms)
    }

    fn open(&mut self, price: f64, now_ms: i64) -> Option<&TradeRecord> {
        let amount = self.balance * self.settings.position_fraction;
        if amount <= 0.0 {
            return None;
        }
        let quantity = amount / price;
        self.balance -= amount;
        self.position = Some(OpenPosition {
            entry_price: price,
            quantity,
            opened_at_ms: now_ms,
        });

        if DF.log_simulation_events {
            log::info!("[sim] BUY {:.6} @ {:.4} (balance {:.2})", quantity, price, self.balance);
        }

        self.push(TradeRecord {
            timestamp_ms: now_ms,
            side: TradeSide::Buy,
            price,
            quantity,
            balance_after: self.balance,
            profit_percent: None,
            reason: TradeReason::BuySignal,
        })
    }

    fn close(
        &mut self,
        price: f64,
        profit_pct: f64,
        reason: TradeReason,
        now_ms: i64,
    ) -> Option<&TradeRecord> {
        let position = self.position.take()?;
        self.balance += position.quantity * price;

        if DF.log_simulation_events {
            log::info!(
                "[sim] SELL {:.6} @ {:.4} ({}: {:+.2}%, balance {:.2})",
                position.quantity,
                price,
                reason,
                profit_pct,
                self.balance
            );
        }

        self.push(TradeRecord {
            timestamp_ms: now_ms,
            side: TradeSide::Sell,
            price,
            quantity: position.quantity,
            balance_after: self.balance,
            profit_percent: Some(profit_pct),
            reason,
        })
    }

    fn push(&mut self, record: TradeRecord) -> Option<&TradeRecord> {
        self.last_trade_ms = Some(record.timestamp_ms);
        self.trades.push(record);
        self.trades.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> SimulationSettings {
        SimulationSettings {
            initial_balance: 1_000_000.0,
            position_fraction: 0.30,
            cooldown: Duration::from_secs(5),
            signal_threshold: 50.0,
            take_profit_pct: 2.0,
            stop_loss_pct: 1.0,
        }
    }

    #[test]
    fn threshold_buy_then_take_profit() {
        let mut trader = PaperTrader::new(settings());

        let buy = trader.evaluate(100.0, 60.0, false, 0).cloned().expect("should buy");
        assert_eq!(buy.side, TradeSide::Buy);
        assert!((buy.quantity - 3_000.0).abs() < 1e-9);
        assert!((trader.balance() - 700_000.0).abs() < 1e-6);

        let sell = trader.evaluate(102.0, 10.0, false, 1_000).cloned().expect("should sell");
        assert_eq!(sell.side, TradeSide::Sell);
        assert_eq!(sell.reason, TradeReason::TakeProfit);
        assert!((sell.profit_percent.unwrap() - 2.0).abs() < 1e-9);
        assert!((trader.balance() - 1_006_000.0).abs() < 1e-6);
        assert!(trader.position().is_none());
    }

    #[test]
    fn weak_signal_does_not_open() {
        let mut trader = PaperTrader::new(settings());
        assert!(trader.evaluate(100.0, 49.9, false, 0).is_none());
        assert!(trader.trades().is_empty());
        assert_eq!(trader.skipped_signals(), 0);
    }

    #[test]
    fn stop_loss_fires_at_threshold() {
        let mut trader = PaperTrader::new(settings());
        trader.evaluate(100.0, 80.0, false, 0);
        assert!(trader.evaluate(99.5, 80.0, false, 10).is_none());
        let sell = trader.evaluate(99.0, 80.0, false, 20).cloned().unwrap();
        assert_eq!(sell.reason, TradeReason::StopLoss);
        assert!(sell.profit_percent.unwrap() < 0.0);
    }

    #[test]
    fn sell_signal_needs_weak_strength() {
        let mut trader = PaperTrader::new(settings());
        trader.evaluate(100.0, 80.0, false, 0);

        // Strong buy strength overrides the sell recommendation.
        assert!(trader.evaluate(100.5, 30.0, true, 10).is_none());

        let sell = trader.evaluate(100.5, 20.0, true, 20).cloned().unwrap();
        assert_eq!(sell.reason, TradeReason::SellSignal);
    }

    #[test]
    fn cooldown_blocks_immediate_reentry() {
        let mut trader = PaperTrader::new(settings());
        trader.evaluate(100.0, 80.0, false, 0);
        trader.evaluate(103.0, 80.0, false, 1_000);
        assert!(trader.position().is_none());

        assert!(trader.evaluate(103.0, 90.0, false, 4_999).is_none());
        assert!(trader.evaluate(103.0, 10.0, false, 5_500).is_none());
        assert_eq!(trader.skipped_signals(), 1);
        assert!(trader.evaluate(103.0, 90.0, false, 6_000).is_some());
        assert_eq!(trader.trades().len(), 3);
        assert_eq!(trader.skipped_signals(), 1);
    }

    #[test]
    fn ignores_updates_without_price() {
        let mut trader = PaperTrader::new(settings());
        let update = AnalysisUpdate {
            buy_signal_strength: 99.0,
            ..Default::default()
        };
        assert!(trader.on_update(&update, 0).is_none());
    }
}
