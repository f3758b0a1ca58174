//! Hub integration tests.
//!
//! Drive a spawned hub through its handle, with peers represented by their
//! outbound channels. Timer behavior runs on paused tokio time.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use garden_core::{ConnectedCounts, CountdownState, Group};
use garden_protocol::{ConfigCommand, FlowerPlanting, ScreenEvent};
use gardend::effects::{HubEffects, ScreenFanout};
use gardend::hub::{spawn_hub, HubError, HubEvent, HubHandle, HubSettings};
use gardend::registry::{Peer, PeerId};

struct TestHub {
    hub: HubHandle,
    screens: ScreenFanout,
    cancel: CancellationToken,
}

fn start_hub() -> TestHub {
    start_hub_with(HubSettings::default())
}

fn start_hub_with(settings: HubSettings) -> TestHub {
    let screens = ScreenFanout::new(64);
    let cancel = CancellationToken::new();
    let hub = spawn_hub(settings, HubEffects::fanout(&screens), cancel.clone());
    TestHub {
        hub,
        screens,
        cancel,
    }
}

async fn join(hub: &HubHandle, id: u64, group: Group) -> mpsc::Receiver<String> {
    let (peer, rx) = Peer::channel(PeerId::new(id), group);
    assert!(hub.connect(peer).await.unwrap());
    rx
}

async fn next_message(rx: &mut mpsc::Receiver<String>) -> Value {
    let text = timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for hub message")
        .expect("peer channel closed");
    serde_json::from_str(&text).unwrap()
}

/// Reads messages until one has the given command name.
async fn next_command(rx: &mut mpsc::Receiver<String>, command: &str) -> Value {
    loop {
        let message = next_message(rx).await;
        if message["command"] == command {
            return message;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_config_peer_gets_count_state_then_grace_announcement() {
    let t = start_hub();
    let _screen = join(&t.hub, 1, Group::Screen).await;

    let mut config = join(&t.hub, 2, Group::Config).await;

    assert_eq!(
        next_message(&mut config).await,
        json!({"command": "connected-configs", "value": 1})
    );
    assert_eq!(
        next_message(&mut config).await,
        json!({"command": "timer-state", "value": {"remainingMs": 0, "running": false}})
    );

    // After the grace delay, every group's count in announcement order
    let start = tokio::time::Instant::now();
    assert_eq!(
        next_message(&mut config).await,
        json!({"command": "connected-clients", "value": 0})
    );
    assert!(start.elapsed() >= HubSettings::default().grace_delay);
    assert_eq!(
        next_message(&mut config).await,
        json!({"command": "connected-screens", "value": 1})
    );
    assert_eq!(
        next_message(&mut config).await,
        json!({"command": "connected-configs", "value": 1})
    );
}

#[tokio::test(start_paused = true)]
async fn test_counts_follow_connects_and_disconnects() {
    let t = start_hub();

    let _a = join(&t.hub, 1, Group::Config).await;
    let _b = join(&t.hub, 2, Group::Config).await;
    let c = join(&t.hub, 3, Group::Config).await;
    let _screen = join(&t.hub, 4, Group::Screen).await;

    // Registering the same id twice does not double count
    let (dup, _dup_rx) = Peer::channel(PeerId::new(1), Group::Config);
    assert!(!t.hub.connect(dup).await.unwrap());

    assert!(t.hub.disconnect(PeerId::new(3)).await.unwrap());
    assert!(!t.hub.disconnect(PeerId::new(3)).await.unwrap());
    drop(c);

    assert_eq!(
        t.hub.counts().await,
        ConnectedCounts {
            configs: 2,
            screens: 1,
            clients: 0,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_peer_is_not_counted_before_unregister() {
    let t = start_hub();
    let _a = join(&t.hub, 1, Group::Client).await;
    let b = join(&t.hub, 2, Group::Client).await;

    drop(b);
    assert_eq!(t.hub.counts().await.clients, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_announces_new_count() {
    let t = start_hub();
    let mut config = join(&t.hub, 1, Group::Config).await;
    let _client = join(&t.hub, 2, Group::Client).await;

    assert_eq!(
        next_command(&mut config, "connected-clients").await["value"],
        1
    );

    t.hub.disconnect(PeerId::new(2)).await.unwrap();
    assert_eq!(
        next_command(&mut config, "connected-clients").await["value"],
        0
    );
}

#[tokio::test(start_paused = true)]
async fn test_countdown_runs_to_zero_once() {
    let t = start_hub();
    let mut config = join(&t.hub, 1, Group::Config).await;
    let mut events = t.hub.subscribe();

    t.hub
        .dispatch(PeerId::new(1), ConfigCommand::TimerSet(json!(500)))
        .await
        .unwrap();
    t.hub
        .dispatch(PeerId::new(1), ConfigCommand::TimerStart)
        .await
        .unwrap();

    let mut states = Vec::new();
    loop {
        let message = next_message(&mut config).await;
        match message["command"].as_str() {
            Some("timer-state") => states.push(message["value"].clone()),
            Some("timer-finished") => break,
            _ => {}
        }
    }

    // The connect-time state, set, start, then 5 ticks
    assert_eq!(
        states,
        vec![
            json!({"remainingMs": 0, "running": false}),
            json!({"remainingMs": 500, "running": false}),
            json!({"remainingMs": 500, "running": true}),
            json!({"remainingMs": 400, "running": true}),
            json!({"remainingMs": 300, "running": true}),
            json!({"remainingMs": 200, "running": true}),
            json!({"remainingMs": 100, "running": true}),
            json!({"remainingMs": 0, "running": false}),
        ]
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        t.hub.countdown().await,
        Some(CountdownState {
            remaining_ms: 0,
            running: false,
        })
    );

    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        if event == HubEvent::CountdownFinished {
            finished += 1;
        }
    }
    assert_eq!(finished, 1);

    while let Ok(text) = config.try_recv() {
        assert!(!text.contains("timer-finished"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_pause_then_start_resumes() {
    let t = start_hub();
    let id = PeerId::new(1);
    let _config = join(&t.hub, 1, Group::Config).await;

    t.hub
        .dispatch(id, ConfigCommand::TimerSet(json!(1000)))
        .await
        .unwrap();
    t.hub.dispatch(id, ConfigCommand::TimerStart).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    t.hub.dispatch(id, ConfigCommand::TimerPause).await.unwrap();

    let paused = t.hub.countdown().await.unwrap();
    assert!(!paused.running);
    assert!(paused.remaining_ms < 1000);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(t.hub.countdown().await.unwrap(), paused);

    t.hub.dispatch(id, ConfigCommand::TimerStart).await.unwrap();
    let resumed = t.hub.countdown().await.unwrap();
    assert_eq!(resumed.remaining_ms, paused.remaining_ms);
    assert!(resumed.running);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_timer_set_changes_nothing() {
    let t = start_hub();
    let id = PeerId::new(1);
    let _config = join(&t.hub, 1, Group::Config).await;

    t.hub
        .dispatch(id, ConfigCommand::TimerSet(json!(800)))
        .await
        .unwrap();

    for bad in [json!(-5), json!("soon"), json!(1.5), Value::Null] {
        let result = t.hub.dispatch(id, ConfigCommand::TimerSet(bad)).await;
        assert!(matches!(result, Err(HubError::Domain(_))));
    }

    assert_eq!(
        t.hub.countdown().await.unwrap(),
        CountdownState {
            remaining_ms: 800,
            running: false,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_config_commands_reach_screens() {
    let t = start_hub();
    let id = PeerId::new(1);
    let mut screen = t.screens.subscribe();

    t.hub
        .dispatch(id, ConfigCommand::BuildingVisible(true))
        .await
        .unwrap();
    t.hub
        .dispatch(id, ConfigCommand::InvolvedDuration(json!(45000)))
        .await
        .unwrap();
    let planting = FlowerPlanting {
        life_duration: Some(12.5),
        x: Some(0.25),
        y: None,
    };
    t.hub
        .dispatch(id, ConfigCommand::InvolvedRestart(planting))
        .await
        .unwrap();

    assert_eq!(
        screen.recv().await.unwrap(),
        ScreenEvent::BuildingVisible { value: true }
    );
    assert_eq!(
        screen.recv().await.unwrap(),
        ScreenEvent::InvolvedDuration { value: 45000 }
    );
    // Restart also plants a flower on the same dispatch
    assert_eq!(screen.recv().await.unwrap(), ScreenEvent::InvolvedRestart);
    assert_eq!(
        screen.recv().await.unwrap(),
        ScreenEvent::PlantFlower(planting)
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_involved_duration_not_forwarded() {
    let t = start_hub();
    let mut screen = t.screens.subscribe();

    let result = t
        .hub
        .dispatch(PeerId::new(1), ConfigCommand::InvolvedDuration(json!(-1)))
        .await;
    assert!(matches!(result, Err(HubError::Domain(_))));
    assert!(screen.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_failing_peer_does_not_block_others() {
    let t = start_hub();
    let mut a = join(&t.hub, 1, Group::Config).await;
    let b = join(&t.hub, 2, Group::Config).await;
    let mut c = join(&t.hub, 3, Group::Config).await;
    drop(b);

    t.hub
        .dispatch(PeerId::new(1), ConfigCommand::TimerSet(json!(42)))
        .await
        .unwrap();

    for rx in [&mut a, &mut c] {
        let state = loop {
            let message = next_command(rx, "timer-state").await;
            if message["value"]["remainingMs"] == 42 {
                break message;
            }
        };
        assert_eq!(state["value"]["running"], false);
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_announcement() {
    let t = start_hub();
    let mut config = join(&t.hub, 1, Group::Config).await;

    // Immediate count and state
    next_message(&mut config).await;
    next_message(&mut config).await;

    t.cancel.cancel();

    let late = timeout(HubSettings::default().grace_delay * 3, config.recv()).await;
    assert!(late.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_zero_tick_interval_falls_back_to_default() {
    let t = start_hub_with(HubSettings {
        tick_interval: Duration::ZERO,
        grace_delay: Duration::from_millis(50),
    });
    let id = PeerId::new(1);
    let mut config = join(&t.hub, 1, Group::Config).await;

    t.hub
        .dispatch(id, ConfigCommand::TimerSet(json!(300)))
        .await
        .unwrap();
    t.hub.dispatch(id, ConfigCommand::TimerStart).await.unwrap();

    next_command(&mut config, "timer-finished").await;
    assert_eq!(
        t.hub.countdown().await,
        Some(CountdownState {
            remaining_ms: 0,
            running: false,
        })
    );
}
