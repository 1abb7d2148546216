use crate::models::{TradeRecord, TradeSide};

/// Summary of a simulated trade log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStats {
    pub total_trades: usize,
    /// Round trips (closed positions)
    pub completed_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub average_profit_pct: f64,
    pub max_profit_pct: f64,
    pub max_loss_pct: f64,
    /// Return of `equity` over the initial balance
    pub total_return_pct: f64,
}

impl TradeStats {
    pub fn from_trades(trades: &[TradeRecord], initial_balance: f64, equity: f64) -> Self {
        let closed: Vec<f64> = trades
            .iter()
            .filter(|t| t.side == TradeSide::Sell)
            .filter_map(|t| t.profit_percent)
            .collect();

        let wins = closed.iter().filter(|&&p| p > 0.0).count();
        let losses = closed.len() - wins;

        let (average, max_profit, max_loss) = if closed.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = closed.iter().sum();
            let max = closed.iter().copied().fold(f64::MIN, f64::max);
            let min = closed.iter().copied().fold(f64::MAX, f64::min);
            (sum / closed.len() as f64, max, min)
        };

        let total_return_pct = if initial_balance > 0.0 {
            (equity / initial_balance - 1.0) * 100.0
        } else {
            0.0
        };

        Self {
            total_trades: trades.len(),
            completed_trades: closed.len(),
            wins,
            losses,
            win_rate: if closed.is_empty() {
                0.0
            } else {
                wins as f64 / closed.len() as f64 * 100.0
            },
            average_profit_pct: average,
            max_profit_pct: max_profit,
            max_loss_pct: max_loss,
            total_return_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeReason;

    fn sell(profit: f64) -> TradeRecord {
        TradeRecord {
            timestamp_ms: 0,
            side: TradeSide::Sell,
            price: 1.0,
            quantity: 1.0,
            balance_after: 0.0,
            profit_percent: Some(profit),
            reason: TradeReason::TakeProfit,
        }
    }

    #[test]
    fn win_rate_and_extremes() {
        let buy = TradeRecord {
            side: TradeSide::Buy,
            profit_percent: None,
            reason: TradeReason::BuySignal,
            ..sell(0.0)
        };
        let trades = vec![buy.clone(), sell(2.0), buy.clone(), sell(-1.0), buy, sell(4.0)];
        let stats = TradeStats::from_trades(&trades, 1_000.0, 1_050.0);

        assert_eq!(stats.total_trades, 6);
        assert_eq!(stats.completed_trades, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate - 66.666_666).abs() < 1e-3);
        assert!((stats.average_profit_pct - 5.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.max_profit_pct, 4.0);
        assert_eq!(stats.max_loss_pct, -1.0);
        assert!((stats.total_return_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn empty_log() {
        let stats = TradeStats::from_trades(&[], 1_000.0, 1_000.0);
        assert_eq!(stats, TradeStats::default());
    }
}
