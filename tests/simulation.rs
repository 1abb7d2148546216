mod common;

use analysis_desk::config::{STREAM, SimulationSettings};
use analysis_desk::domain::{CardSpec, TradingStyle};
use analysis_desk::engine::{ConnectionStatus, ManagerCommand, TopicKind};
use analysis_desk::models::{TradeReason, TradeSide};
use serde_json::json;
use tokio::sync::mpsc::unbounded_channel;

use common::{TEMP_ID, btc_card, desk};

fn settings() -> SimulationSettings {
    SimulationSettings {
        initial_balance: 1_000_000.0,
        signal_threshold: 50.0,
        take_profit_pct: 2.0,
        stop_loss_pct: 1.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn threshold_buy_then_take_profit() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();
    assert!(desk.manager.enable_simulation(TEMP_ID, settings()));

    let topic = TopicKind::Card.destination(TEMP_ID);
    desk.connector.deliver(
        handle,
        &topic,
        &json!({ "currentPrice": 100.0, "buySignalStrength": 60.0, "timestamp": 1_000 }).to_string(),
    );
    desk.connector.deliver(
        handle,
        &topic,
        &json!({ "currentPrice": 102.0, "buySignalStrength": 10.0, "timestamp": 2_000 }).to_string(),
    );
    desk.manager.process_pending().await;

    let trades = desk.view.trades();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0].side, TradeSide::Buy);
    assert_eq!(trades[0].quantity, 3_000.0);
    assert_eq!(trades[1].side, TradeSide::Sell);
    assert_eq!(trades[1].reason, TradeReason::TakeProfit);
    assert!((trades[1].profit_percent.unwrap() - 2.0).abs() < 1e-9);

    let trader = desk.manager.simulation(TEMP_ID).unwrap();
    assert!((trader.balance() - 1_006_000.0).abs() < 1e-6);
    assert_eq!(trader.stats().wins, 1);
}

#[tokio::test]
async fn no_trades_without_simulation() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();
    desk.connector.deliver(
        handle,
        &TopicKind::Card.destination(TEMP_ID),
        &json!({ "currentPrice": 100.0, "buySignalStrength": 90.0 }).to_string(),
    );
    desk.manager.process_pending().await;
    assert!(desk.view.trades().is_empty());
    assert!(desk.manager.simulation(TEMP_ID).is_none());
}

#[tokio::test]
async fn threshold_can_change_while_running() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();
    desk.manager.enable_simulation(TEMP_ID, settings());
    assert!(desk.manager.set_signal_threshold(TEMP_ID, 80.0));

    desk.connector.deliver(
        handle,
        &TopicKind::Card.destination(TEMP_ID),
        &json!({ "currentPrice": 100.0, "buySignalStrength": 60.0, "timestamp": 1_000 }).to_string(),
    );
    desk.manager.process_pending().await;
    assert!(desk.view.trades().is_empty());

    let trader = desk.manager.disable_simulation(TEMP_ID).unwrap();
    assert_eq!(trader.settings().signal_threshold, 80.0);
    assert!(!desk.manager.set_signal_threshold(TEMP_ID, 10.0));
}

#[tokio::test]
async fn run_loop_opens_cards_and_closes_them_on_shutdown() {
    let desk = desk();
    let connector = desk.connector.clone();
    let (commands, commands_rx) = unbounded_channel();

    commands
        .send(ManagerCommand::Open {
            spec: CardSpec::new("BINANCE", "BTC", "USDT", TradingStyle::Scalping),
            simulation: Some(settings()),
        })
        .unwrap();
    commands.send(ManagerCommand::Shutdown).unwrap();

    let finished = desk.manager.run(commands_rx).await;
    assert_eq!(finished.len(), 1);
    let stopped = &finished[0];
    assert_eq!(stopped.status, ConnectionStatus::Closed);
    assert!(stopped.card.temporary_id.starts_with("binance-btcusdt-"));
    assert!(stopped.simulation.is_some());

    assert_eq!(connector.published(STREAM.topics.start_destination).len(), 1);
    assert_eq!(connector.published(STREAM.topics.stop_destination).len(), 1);
    assert_eq!(connector.total_active_subscriptions(), 0);
}
