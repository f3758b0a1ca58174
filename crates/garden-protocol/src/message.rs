//! Outbound message types.

use garden_core::{CountdownState, Group};
use serde::{Deserialize, Serialize};

use crate::command::FlowerPlanting;
use crate::frame::InputFrame;

/// Messages the hub broadcasts to config peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum HubMessage {
    /// Number of connected input devices
    ConnectedClients { value: usize },

    /// Number of connected displays
    ConnectedScreens { value: usize },

    /// Number of connected control panels
    ConnectedConfigs { value: usize },

    /// Current countdown state (sent on every tick and timer command)
    TimerState { value: CountdownState },

    /// The countdown reached zero on its own
    TimerFinished,
}

impl HubMessage {
    /// Creates the count announcement for one group.
    pub fn connected(group: Group, count: usize) -> Self {
        match group {
            Group::Client => Self::ConnectedClients { value: count },
            Group::Screen => Self::ConnectedScreens { value: count },
            Group::Config => Self::ConnectedConfigs { value: count },
        }
    }

    /// Creates a timer state message.
    pub fn timer_state(state: CountdownState) -> Self {
        Self::TimerState { value: state }
    }
}

/// Events delivered to every screen peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum ScreenEvent {
    BuildingVisible { value: bool },

    BuildingOnly { value: bool },

    EntranceVisible { value: bool },

    InvolvedRestart,

    PlantFlower(FlowerPlanting),

    InvolvedDuration { value: u64 },

    /// An input frame relayed from a client device
    Input {
        /// Peer id of the sending device
        client: u64,
        /// Frame command (`p`, `color`, `flash`, ...)
        input: String,
        /// Positional frame values
        value: Vec<i64>,
    },
}

impl ScreenEvent {
    /// Wraps a relayed client frame.
    pub fn input(client: u64, frame: InputFrame) -> Self {
        Self::Input {
            client,
            input: frame.command,
            value: frame.values,
        }
    }
}
