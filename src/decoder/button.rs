use std::sync::Arc;
use tracing::{debug, info};

use crate::device::protocol::ButtonFrame;
use crate::state::{ButtonState, OrientationStore};

/// Decodes button notifications into press/release transitions.
///
/// Never produces [`ButtonState::Acknowledged`]; that is the mode toggle
/// controller's job.
#[derive(Clone, Debug)]
pub struct ButtonDecoder {
    store: Arc<OrientationStore>,
}

impl ButtonDecoder {
    pub fn new(store: Arc<OrientationStore>) -> Self {
        Self { store }
    }

    /// Returns the decoded frame, or `None` when the payload is not a button
    /// notification.
    pub fn handle(&self, payload: &[u8]) -> Option<ButtonFrame> {
        let frame = ButtonFrame::parse(payload)?;
        info!("Button notification: {:?}", frame);
        let state = match frame {
            ButtonFrame::Pressed => self.store.press(),
            ButtonFrame::Released => self.store.release(),
        };
        debug!("Button state now {:?}", state);
        Some(frame)
    }

    pub fn state(&self) -> ButtonState {
        self.store.button_state()
    }
}
