//! Hub actor - owns the session registry and the countdown.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Send failures to peers and observers are logged, never propagated

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use garden_core::{parse_duration_ms, Countdown, Group, TickOutcome};
use garden_protocol::{ConfigCommand, HubMessage};

use super::commands::{HubCommand, HubError, HubEvent};
use super::HubSettings;
use crate::effects::HubEffects;
use crate::registry::{Peer, PeerId, SessionRegistry};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// The hub actor.
///
/// Receives commands via mpsc, processes them one at a time, and is the
/// only writer of the registry and the countdown.
pub struct HubActor {
    receiver: mpsc::Receiver<HubCommand>,

    /// Used to schedule delayed commands without keeping the actor alive
    scheduler: mpsc::WeakSender<HubCommand>,

    registry: SessionRegistry,
    countdown: Countdown,
    settings: HubSettings,
    effects: HubEffects,

    event_publisher: broadcast::Sender<HubEvent>,
    cancel_token: CancellationToken,
}

impl HubActor {
    pub fn new(
        receiver: mpsc::Receiver<HubCommand>,
        scheduler: mpsc::WeakSender<HubCommand>,
        settings: HubSettings,
        effects: HubEffects,
        event_publisher: broadcast::Sender<HubEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            scheduler,
            registry: SessionRegistry::new(),
            countdown: Countdown::new(),
            settings,
            effects,
            event_publisher,
            cancel_token,
        }
    }

    /// Runs the actor event loop until every command sender is dropped.
    pub async fn run(mut self) {
        info!("Hub actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(peers = self.registry.len(), "Hub actor stopped");
    }

    /// Dispatches a command to the appropriate handler.
    pub(crate) fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Connect { peer, respond_to } => {
                let result = self.handle_connect(peer);
                // Ignore send error - caller may have dropped the receiver
                let _ = respond_to.send(result);
            }
            HubCommand::Disconnect {
                peer_id,
                respond_to,
            } => {
                let result = self.handle_disconnect(peer_id);
                let _ = respond_to.send(result);
            }
            HubCommand::Dispatch {
                peer_id,
                command,
                respond_to,
            } => {
                debug!(peer = %peer_id, command = command.name(), "Config command");
                let result = self.handle_dispatch(command);
                let _ = respond_to.send(result);
            }
            HubCommand::GetCounts { respond_to } => {
                let _ = respond_to.send(self.registry.counts());
            }
            HubCommand::GetCountdown { respond_to } => {
                let _ = respond_to.send(self.countdown.state());
            }
            HubCommand::Tick => self.handle_tick(),
            HubCommand::AnnounceCounts => {
                for group in Group::ALL {
                    self.announce_count(group);
                }
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_connect(&mut self, peer: Peer) -> bool {
        let peer_id = peer.id;
        let group = peer.group;

        if !self.registry.register(peer) {
            debug!(peer = %peer_id, "Peer already registered");
            return false;
        }

        info!(peer = %peer_id, group = %group, "Peer connected");
        self.publish(HubEvent::PeerConnected { peer_id, group });
        self.announce_count(group);

        if group == Group::Config {
            self.send_countdown_to(peer_id);
            self.schedule_count_announcement();
        }

        true
    }

    fn handle_disconnect(&mut self, peer_id: PeerId) -> bool {
        let Some(peer) = self.registry.unregister(peer_id) else {
            return false;
        };

        let connected_secs = (Utc::now() - peer.connected_at).num_seconds();
        info!(
            peer = %peer_id,
            group = %peer.group,
            connected_secs,
            "Peer disconnected"
        );
        self.publish(HubEvent::PeerDisconnected {
            peer_id,
            group: peer.group,
        });
        self.announce_count(peer.group);
        true
    }

    fn handle_dispatch(&mut self, command: ConfigCommand) -> Result<(), HubError> {
        match command {
            ConfigCommand::TimerSet(value) => {
                self.countdown.set_value(&value)?;
                self.publish_countdown();
            }
            ConfigCommand::TimerStart => {
                self.countdown.start();
                self.publish_countdown();
            }
            ConfigCommand::TimerPause => {
                self.countdown.pause();
                self.publish_countdown();
            }
            ConfigCommand::TimerStop => {
                self.countdown.stop();
                self.publish_countdown();
            }
            ConfigCommand::InvolvedDuration(value) => {
                let duration_ms = parse_duration_ms(&value)?;
                self.effects.durations.update_involved_duration(duration_ms);
            }
            ConfigCommand::BuildingVisible(visible) => {
                self.effects.screen.set_building_visible(visible);
            }
            ConfigCommand::BuildingOnly(enabled) => {
                self.effects.screen.set_building_only(enabled);
            }
            ConfigCommand::EntranceVisible(visible) => {
                self.effects.screen.set_entrance_visible(visible);
            }
            ConfigCommand::InvolvedRestart(planting) => {
                // Restarting always plants a flower too
                self.effects.screen.restart_involved();
                self.effects.screen.plant_flower(&planting);
            }
            ConfigCommand::PlantFlower(planting) => {
                self.effects.screen.plant_flower(&planting);
            }
        }
        Ok(())
    }

    fn handle_tick(&mut self) {
        match self.countdown.tick(self.settings.tick_interval) {
            TickOutcome::Inactive => {}
            TickOutcome::Ticked(state) => {
                self.broadcast(&HubMessage::timer_state(state));
                self.publish(HubEvent::Countdown(state));
            }
            TickOutcome::Finished(state) => {
                info!("Countdown finished");
                self.broadcast(&HubMessage::timer_state(state));
                self.broadcast(&HubMessage::TimerFinished);
                self.publish(HubEvent::Countdown(state));
                self.publish(HubEvent::CountdownFinished);
            }
        }
    }

    // ========================================================================
    // Broadcasting
    // ========================================================================

    /// Sends `message` to every open config peer.
    ///
    /// Iterates a snapshot of the config group; a failed send is logged and
    /// skipped.
    pub(crate) fn broadcast(&self, message: &HubMessage) -> BroadcastReport {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "Failed to serialize broadcast");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        for peer in self.registry.snapshot(Group::Config) {
            match peer.send(json.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(error = %e, "Skipping peer in broadcast");
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn announce_count(&self, group: Group) {
        let count = self.registry.count_of(group);
        debug!(group = %group, count, "Announcing count");
        self.broadcast(&HubMessage::connected(group, count));
        self.publish(HubEvent::CountAnnounced { group, count });
    }

    fn publish_countdown(&self) {
        let state = self.countdown.state();
        self.broadcast(&HubMessage::timer_state(state));
        self.publish(HubEvent::Countdown(state));
    }

    /// Sends the current countdown to one peer, so a fresh control panel
    /// does not wait for the next tick.
    fn send_countdown_to(&self, peer_id: PeerId) {
        let Some(peer) = self.registry.get(peer_id) else {
            return;
        };
        let message = HubMessage::timer_state(self.countdown.state());
        match serde_json::to_string(&message) {
            Ok(json) => {
                if let Err(e) = peer.send(json) {
                    debug!(error = %e, "Failed to send countdown to new peer");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize countdown"),
        }
    }

    /// Schedules one `AnnounceCounts` after the grace delay.
    ///
    /// Skipped if the hub is gone or shutting down by then.
    fn schedule_count_announcement(&self) {
        let scheduler = self.scheduler.clone();
        let delay = self.settings.grace_delay;
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Count announcement cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if let Some(sender) = scheduler.upgrade() {
                let _ = sender.send(HubCommand::AnnounceCounts).await;
            }
        });
    }

    fn publish(&self, event: HubEvent) {
        // No subscribers is fine
        let _ = self.event_publisher.send(event);
    }
}
