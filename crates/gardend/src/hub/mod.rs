//! Broadcast hub using Actor pattern.
//!
//! The hub is the single owner of session state: the peer registry and the
//! countdown. Connection tasks, the tick task and grace-delay timers talk to
//! it through an mpsc channel, so every mutation happens on one task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  HubCommand   ┌─────────────────┐   HubMessage   ┌──────────────┐
//! │ ConnectionHandler│──────────────▶│    HubActor     │───────────────▶│ config peers │
//! │  (per peer)      │   (mpsc)      │ SessionRegistry │  (per-peer     └──────────────┘
//! └──────────────────┘               │ Countdown       │   queues)
//! ┌──────────────────┐     Tick      │                 │  effects       ┌──────────────┐
//! │    tick task     │──────────────▶│                 │───────────────▶│ ScreenFanout │
//! └──────────────────┘               └─────────────────┘                └──────────────┘
//! ```

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

mod actor;
mod commands;
mod handle;

pub use actor::{BroadcastReport, HubActor};
pub use commands::{HubCommand, HubError, HubEvent};
pub use handle::HubHandle;

use crate::effects::HubEffects;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Default countdown tick period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default delay before a config connection's count announcement
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(3);

/// Timing knobs for the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    /// How often the countdown advances, and by how much.
    pub tick_interval: Duration,
    /// Wait after a config peer connects before announcing every count.
    pub grace_delay: Duration,
}

impl HubSettings {
    /// Replaces a zero tick interval, which the ticker cannot run with, by
    /// the default.
    pub fn normalized(self) -> Self {
        if !self.tick_interval.is_zero() {
            return self;
        }
        warn!(
            default_ms = DEFAULT_TICK_INTERVAL.as_millis() as u64,
            "Zero tick interval, using default"
        );
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            ..self
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            grace_delay: DEFAULT_GRACE_DELAY,
        }
    }
}

/// Spawn the hub actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the HubActor on a tokio task
/// 3. Spawns the countdown tick task
/// 4. Returns a HubHandle for connection tasks
///
/// The actor stops when every handle is dropped; the tick task stops with
/// it or when `cancel_token` fires. A zero tick interval falls back to
/// [`DEFAULT_TICK_INTERVAL`].
pub fn spawn_hub(
    settings: HubSettings,
    effects: HubEffects,
    cancel_token: CancellationToken,
) -> HubHandle {
    let settings = settings.normalized();
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = HubActor::new(
        cmd_rx,
        cmd_tx.downgrade(),
        settings,
        effects,
        event_tx.clone(),
        cancel_token.clone(),
    );
    tokio::spawn(actor.run());

    spawn_tick_task(cmd_tx.downgrade(), settings.tick_interval, cancel_token);

    HubHandle::new(cmd_tx, event_tx)
}

/// Spawn the process-wide countdown ticker.
///
/// Holds only a weak sender so it never keeps the actor alive.
fn spawn_tick_task(
    sender: mpsc::WeakSender<HubCommand>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Tick task stopping: shutdown requested");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let Some(sender) = sender.upgrade() else {
                debug!("Tick task stopping: hub stopped");
                break;
            };
            if sender.send(HubCommand::Tick).await.is_err() {
                debug!("Tick task stopping: hub channel closed");
                break;
            }
        }
    });
}
