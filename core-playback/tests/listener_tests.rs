//! Event fan-out tests.
//!
//! Runs on a paused clock: sleeps advance virtual time once every task is
//! idle, so debounce windows are exact.

mod common;

use common::{config_builder, coordinator, Deliveries, RecordingEngine};
use bridge_traits::{LifecycleOptions, PlayerOptions};
use core_playback::{PlaybackCoordinator, Player};
use core_runtime::config::EventScope;
use core_runtime::events::EngineEvent;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn status_boundary_flushes_coalesced_burst() {
    let engine = RecordingEngine::new();
    let coordinator = coordinator(&engine);
    let x = coordinator.create_item("a").unwrap();
    let deliveries = Deliveries::default();
    let _listener = x.add_listener(deliveries.callback());

    let key = x.key().get();
    coordinator.dispatch(EngineEvent::updated(key, "buffering"));
    coordinator.dispatch(EngineEvent::updated(key, "buffering"));
    coordinator.dispatch(EngineEvent::updated(key, "playing"));
    sleep(Duration::from_millis(100)).await;

    assert_eq!(deliveries.statuses(), vec!["buffering", "playing"]);
}

#[tokio::test(start_paused = true)]
async fn same_status_ticks_deliver_latest_once() {
    let engine = RecordingEngine::new();
    let coordinator = coordinator(&engine);
    let x = coordinator.create_item("a").unwrap();
    let deliveries = Deliveries::default();
    let _listener = x.add_listener(deliveries.callback());

    for position in 0..5 {
        coordinator.dispatch(
            EngineEvent::updated(x.key().get(), "playing").with_field("position", position),
        );
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(deliveries.len(), 0);

    sleep(Duration::from_millis(100)).await;
    let events = deliveries.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].field("position"), Some(&serde_json::json!(4)));
}

#[tokio::test(start_paused = true)]
async fn payloads_further_apart_than_window_are_all_delivered() {
    let engine = RecordingEngine::new();
    let coordinator = coordinator(&engine);
    let x = coordinator.create_item("a").unwrap();
    let deliveries = Deliveries::default();
    let _listener = x.add_listener(deliveries.callback());

    coordinator.dispatch(EngineEvent::updated(x.key().get(), "playing"));
    sleep(Duration::from_millis(60)).await;
    coordinator.dispatch(EngineEvent::updated(x.key().get(), "playing"));
    sleep(Duration::from_millis(60)).await;

    assert_eq!(deliveries.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn payloads_for_other_items_are_ignored() {
    let engine = RecordingEngine::new();
    let coordinator = coordinator(&engine);
    let x = coordinator.create_item("a").unwrap();
    let y = coordinator.create_item("b").unwrap();
    let deliveries = Deliveries::default();
    let _listener = x.add_listener(deliveries.callback());

    coordinator.dispatch(EngineEvent::updated(y.key().get(), "playing"));
    // Not an item status payload.
    coordinator.dispatch(EngineEvent::new("playback-queue-ended", x.key().get()));
    sleep(Duration::from_millis(100)).await;

    assert_eq!(deliveries.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_window_delivers_every_payload() {
    let engine = RecordingEngine::new();
    let config = config_builder(&engine)
        .listener_debounce(Duration::ZERO)
        .build()
        .unwrap();
    let coordinator = PlaybackCoordinator::new(config);
    let x = coordinator.create_item("a").unwrap();
    let deliveries = Deliveries::default();
    let _listener = x.add_listener(deliveries.callback());

    for _ in 0..3 {
        coordinator.dispatch(EngineEvent::updated(x.key().get(), "playing"));
    }
    sleep(Duration::from_millis(1)).await;

    assert_eq!(deliveries.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn removed_listener_receives_nothing() {
    let engine = RecordingEngine::new();
    let coordinator = coordinator(&engine);
    let x = coordinator.create_item("a").unwrap();
    let deliveries = Deliveries::default();
    let listener = x.add_listener(deliveries.callback());

    x.remove_listener(listener);
    coordinator.dispatch(EngineEvent::updated(x.key().get(), "playing"));
    sleep(Duration::from_millis(100)).await;

    assert_eq!(deliveries.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn active_item_scope_follows_the_slot() {
    let engine = RecordingEngine::new();
    let config = config_builder(&engine)
        .event_scope(EventScope::ActiveItem)
        .build()
        .unwrap();
    let coordinator = PlaybackCoordinator::new(config);
    let x = coordinator.create_item("a").unwrap();
    let y = coordinator.create_item("b").unwrap();
    let to_x = Deliveries::default();
    let to_y = Deliveries::default();
    let _x_listener = x.add_listener(to_x.callback());
    let _y_listener = y.add_listener(to_y.callback());

    x.activate(LifecycleOptions::default()).await.unwrap();
    // The engine keys payloads by whatever it is playing; scope ignores it.
    coordinator.dispatch(EngineEvent::updated(999, "playing"));
    sleep(Duration::from_millis(100)).await;

    assert_eq!(to_x.len(), 1);
    assert_eq!(to_y.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn player_listener_filters_by_key_and_channel() {
    let engine = RecordingEngine::new();
    let coordinator = coordinator(&engine);
    let player = Player::create(&coordinator, PlayerOptions::default())
        .await
        .unwrap();
    let deliveries = Deliveries::default();
    let _listener = player.add_listener("playback-queue-ended", deliveries.callback());

    let key = player.key().get();
    coordinator.dispatch(EngineEvent::new("playback-queue-ended", key));
    coordinator.dispatch(EngineEvent::new("playback-queue-ended", key));
    coordinator.dispatch(EngineEvent::new("playback-track-changed", key));
    coordinator.dispatch(EngineEvent::new("playback-queue-ended", key + 1));
    sleep(Duration::from_millis(1)).await;

    assert_eq!(deliveries.len(), 2);
}
