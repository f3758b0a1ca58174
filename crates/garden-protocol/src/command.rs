//! Commands sent by config peers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::FrameError;

/// Raw JSON command envelope as it arrives on the config channel.
///
/// Only `command` is required. Payload fields are kept loose so that an odd
/// payload never makes the whole envelope unreadable.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandEnvelope {
    pub command: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub x: Value,
    #[serde(default)]
    pub y: Value,
    #[serde(default, rename = "lifeDuration")]
    pub life_duration: Value,
}

impl CommandEnvelope {
    /// Parses a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `FrameError::Json` if the text is not a JSON object with a
    /// string `command` field.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        serde_json::from_str(text).map_err(FrameError::json)
    }
}

/// Where and for how long a flower should grow on the screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowerPlanting {
    #[serde(rename = "lifeDuration", skip_serializing_if = "Option::is_none")]
    pub life_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// A decoded config command.
///
/// Every known command string maps to exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigCommand {
    /// Load a duration into the countdown. The raw value is validated by
    /// the countdown itself.
    TimerSet(Value),
    TimerStart,
    TimerPause,
    TimerStop,
    /// Forwarded to the involved-duration tracker.
    InvolvedDuration(Value),
    BuildingVisible(bool),
    BuildingOnly(bool),
    EntranceVisible(bool),
    /// Restart the involved animation and plant a flower in one go.
    InvolvedRestart(FlowerPlanting),
    PlantFlower(FlowerPlanting),
}

impl ConfigCommand {
    /// Decodes an envelope. Unknown commands yield `None`.
    pub fn from_envelope(envelope: CommandEnvelope) -> Option<Self> {
        let planting = FlowerPlanting {
            life_duration: envelope.life_duration.as_f64(),
            x: envelope.x.as_f64(),
            y: envelope.y.as_f64(),
        };

        let command = match envelope.command.as_str() {
            "timer-set" => Self::TimerSet(envelope.value),
            "timer-start" => Self::TimerStart,
            "timer-pause" => Self::TimerPause,
            "timer-stop" => Self::TimerStop,
            "involved-duration" => Self::InvolvedDuration(envelope.value),
            "building-visible" => Self::BuildingVisible(is_truthy(&envelope.value)),
            "building-only" => Self::BuildingOnly(is_truthy(&envelope.value)),
            "entrance-visible" => Self::EntranceVisible(is_truthy(&envelope.value)),
            "involved-restart" => Self::InvolvedRestart(planting),
            "plant-flower" => Self::PlantFlower(planting),
            _ => return None,
        };
        Some(command)
    }

    /// Parses and decodes a config text frame in one step.
    ///
    /// `Ok(None)` means the frame was well formed but the command is not
    /// one the hub knows; callers ignore it.
    pub fn parse(text: &str) -> Result<Option<Self>, FrameError> {
        CommandEnvelope::parse(text).map(Self::from_envelope)
    }

    /// Returns the wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TimerSet(_) => "timer-set",
            Self::TimerStart => "timer-start",
            Self::TimerPause => "timer-pause",
            Self::TimerStop => "timer-stop",
            Self::InvolvedDuration(_) => "involved-duration",
            Self::BuildingVisible(_) => "building-visible",
            Self::BuildingOnly(_) => "building-only",
            Self::EntranceVisible(_) => "entrance-visible",
            Self::InvolvedRestart(_) => "involved-restart",
            Self::PlantFlower(_) => "plant-flower",
        }
    }
}

/// Loose truthiness used by the display toggles.
///
/// `null`, `false`, `0`, `NaN` and `""` are false; everything else,
/// including empty arrays and objects, is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
