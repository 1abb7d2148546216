mod common;

use std::time::Duration;

use analysis_desk::config::{ManagerConfig, STREAM};
use analysis_desk::engine::{ConnectionStatus, StopTarget, TopicKind};
use analysis_desk::ui::CardControls;
use serde_json::json;

use common::{BACKEND_ID, TEMP_ID, btc_card, desk, desk_with};

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn unexpected_close_reconnects_and_resubscribes() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();

    desk.connector.drop_connection(handle);
    desk.manager.process_pending().await;
    assert_eq!(desk.manager.status(TEMP_ID), Some(ConnectionStatus::Reconnecting));
    assert_eq!(desk.manager.subscription_count(TEMP_ID), 0);
    assert_eq!(desk.view.last_controls(TEMP_ID), Some(CardControls::CONNECTING));

    // nothing happens before the backoff elapses
    wait(500).await;
    desk.manager.process_pending().await;
    assert_eq!(desk.connector.connect_count(handle), 1);

    wait(600).await;
    desk.manager.process_pending().await;
    assert_eq!(desk.manager.status(TEMP_ID), Some(ConnectionStatus::Connected));
    assert_eq!(desk.connector.connect_count(handle), 2);
    assert_eq!(desk.connector.active_subscriptions(handle).len(), 3);
    assert_eq!(desk.connector.published(STREAM.topics.start_destination).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn reconnect_after_remap_uses_the_backend_id() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();
    desk.connector.deliver(
        handle,
        &TopicKind::Card.destination(TEMP_ID),
        &json!({ "cardId": BACKEND_ID }).to_string(),
    );
    desk.manager.process_pending().await;

    desk.connector.drop_connection(handle);
    desk.manager.process_pending().await;
    wait(1100).await;
    desk.manager.process_pending().await;

    assert_eq!(desk.manager.status(BACKEND_ID), Some(ConnectionStatus::Connected));
    assert!(
        desk.connector
            .active_subscriptions(handle)
            .contains(&TopicKind::Card.destination(BACKEND_ID))
    );
    let starts = desk.connector.published(STREAM.topics.start_destination);
    let restart: serde_json::Value = serde_json::from_str(&starts[1]).unwrap();
    assert_eq!(restart["cardId"], BACKEND_ID);

    // the fresh session streams again
    desk.connector.deliver(
        handle,
        &TopicKind::Card.destination(BACKEND_ID),
        &json!({ "cardId": BACKEND_ID, "currentPrice": 10.0 }).to_string(),
    );
    desk.manager.process_pending().await;
    assert_eq!(desk.view.updates_for(BACKEND_ID).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_attempt_cap() {
    let mut config = ManagerConfig::default();
    config.max_reconnect_attempts = 2;
    let mut desk = desk_with(config);
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();

    desk.connector.refuse_next_connects(10);
    desk.connector.drop_connection(handle);
    desk.manager.process_pending().await;

    for _ in 0..3 {
        wait(1100).await;
        desk.manager.process_pending().await;
    }

    assert_eq!(desk.connector.connect_count(handle), 3);
    assert!(desk.manager.is_empty());
    assert_eq!(desk.view.last_controls(TEMP_ID), Some(CardControls::RETRY));
    assert_eq!(desk.view.errors_for(TEMP_ID).len(), 1);
    let retired = desk.manager.take_retired();
    assert_eq!(retired.len(), 1);
    assert_eq!(retired[0].status, ConnectionStatus::Errored);
}

#[tokio::test(start_paused = true)]
async fn a_successful_reconnect_resets_the_attempt_count() {
    let mut config = ManagerConfig::default();
    config.max_reconnect_attempts = 1;
    let mut desk = desk_with(config);
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();

    for round in 0..3 {
        desk.connector.drop_connection(handle);
        desk.manager.process_pending().await;
        wait(1100).await;
        desk.manager.process_pending().await;
        assert_eq!(
            desk.manager.status(TEMP_ID),
            Some(ConnectionStatus::Connected),
            "round {round}"
        );
    }
    assert_eq!(desk.connector.connect_count(handle), 4);
}

#[tokio::test(start_paused = true)]
async fn deliberate_stop_suppresses_reconnect() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();

    desk.connector.drop_connection(handle);
    desk.manager.process_pending().await;
    assert!(
        desk.manager
            .stop_analysis(StopTarget::Id(TEMP_ID.to_string()))
            .await
            .is_some()
    );

    wait(5000).await;
    desk.manager.process_pending().await;
    assert_eq!(desk.connector.connect_count(handle), 1);
    assert!(desk.manager.is_empty());
    // nothing to tell the backend over a dead socket
    assert!(desk.connector.published(STREAM.topics.stop_destination).is_empty());
}

#[tokio::test(start_paused = true)]
async fn events_from_an_old_session_are_ignored() {
    let mut desk = desk();
    let handle = desk.manager.start_analysis(btc_card(TEMP_ID)).await.unwrap();
    desk.manager
        .stop_analysis(StopTarget::Id(TEMP_ID.to_string()))
        .await
        .unwrap();

    // a late close for the stopped session must not bring it back
    desk.connector.drop_connection(handle);
    desk.manager.process_pending().await;
    wait(2000).await;
    desk.manager.process_pending().await;
    assert!(desk.manager.is_empty());
    assert_eq!(desk.connector.connect_count(handle), 1);
}
