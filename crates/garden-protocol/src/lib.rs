//! Garden Protocol - Wire formats for the relay channels
//!
//! This crate provides message types and parsing for the three channels:
//! - config: JSON command envelopes in, hub state broadcasts out
//! - client: compact colon-delimited input frames
//! - screen: JSON display events

pub mod command;
pub mod frame;
pub mod message;

pub use command::{is_truthy, CommandEnvelope, ConfigCommand, FlowerPlanting};
pub use frame::{FrameError, InputFrame};
pub use message::{HubMessage, ScreenEvent};
