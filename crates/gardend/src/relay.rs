//! Forwarding of client input frames to the screens.

use tracing::trace;

use garden_protocol::{FrameError, InputFrame, ScreenEvent};

use crate::effects::ScreenFanout;
use crate::registry::PeerId;

/// Stateless relay from client devices to screens.
///
/// Frames are parsed for structure only, tagged with the sending peer and
/// published to every screen.
#[derive(Clone)]
pub struct InputRelay {
    screens: ScreenFanout,
}

impl InputRelay {
    pub fn new(screens: ScreenFanout) -> Self {
        Self { screens }
    }

    /// Relays one raw frame from `client`.
    ///
    /// Returns the number of screens the frame was published to.
    ///
    /// # Errors
    ///
    /// Returns the `FrameError` for a malformed frame; nothing is published.
    pub fn relay(&self, client: PeerId, raw: &str) -> Result<usize, FrameError> {
        let frame = InputFrame::parse(raw)?;
        trace!(peer = %client, command = %frame.command, "Relaying input frame");
        Ok(self.screens.publish(ScreenEvent::input(client.get(), frame)))
    }
}
