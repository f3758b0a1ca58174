//! Side effects the hub triggers outside itself.
//!
//! The hub only knows these collaborators through two traits. The daemon
//! wires both to [`ScreenFanout`], which turns each call into a
//! [`ScreenEvent`] for every connected screen; tests substitute recorders.

use tokio::sync::broadcast;
use tracing::trace;

use garden_protocol::{FlowerPlanting, ScreenEvent};

/// Default capacity of the screen event channel.
pub const SCREEN_BUFFER: usize = 256;

/// Display changes requested by config peers.
pub trait ScreenEffects: Send {
    fn set_building_visible(&mut self, visible: bool);

    fn set_building_only(&mut self, enabled: bool);

    fn set_entrance_visible(&mut self, visible: bool);

    /// Restart the "involved" animation on every screen.
    fn restart_involved(&mut self);

    fn plant_flower(&mut self, planting: &FlowerPlanting);
}

/// Receives the involved-duration setting.
pub trait DurationSink: Send {
    fn update_involved_duration(&mut self, duration_ms: u64);
}

/// The collaborators handed to the hub at spawn time.
pub struct HubEffects {
    pub screen: Box<dyn ScreenEffects>,
    pub durations: Box<dyn DurationSink>,
}

impl HubEffects {
    pub fn new(screen: Box<dyn ScreenEffects>, durations: Box<dyn DurationSink>) -> Self {
        Self { screen, durations }
    }

    /// Routes every effect to the screens through `fanout`.
    pub fn fanout(fanout: &ScreenFanout) -> Self {
        Self::new(Box::new(fanout.clone()), Box::new(fanout.clone()))
    }
}

/// Publishes screen events to every subscribed screen connection.
///
/// Cheap to clone. Delivery is best effort: with no screens connected the
/// event is dropped, and a screen that lags behind skips events.
#[derive(Clone)]
pub struct ScreenFanout {
    sender: broadcast::Sender<ScreenEvent>,
}

impl ScreenFanout {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes a screen connection to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScreenEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event, returning how many screens will receive it.
    pub fn publish(&self, event: ScreenEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "No screens subscribed, dropping event");
                0
            }
        }
    }
}

impl Default for ScreenFanout {
    fn default() -> Self {
        Self::new(SCREEN_BUFFER)
    }
}

impl ScreenEffects for ScreenFanout {
    fn set_building_visible(&mut self, visible: bool) {
        self.publish(ScreenEvent::BuildingVisible { value: visible });
    }

    fn set_building_only(&mut self, enabled: bool) {
        self.publish(ScreenEvent::BuildingOnly { value: enabled });
    }

    fn set_entrance_visible(&mut self, visible: bool) {
        self.publish(ScreenEvent::EntranceVisible { value: visible });
    }

    fn restart_involved(&mut self) {
        self.publish(ScreenEvent::InvolvedRestart);
    }

    fn plant_flower(&mut self, planting: &FlowerPlanting) {
        self.publish(ScreenEvent::PlantFlower(*planting));
    }
}

impl DurationSink for ScreenFanout {
    fn update_involved_duration(&mut self, duration_ms: u64) {
        self.publish(ScreenEvent::InvolvedDuration { value: duration_ms });
    }
}
