//! Mode Toggle Controller - debounced posture mode switching
//!
//! Polled once per tick. A press that the button decoder marked as
//! [`ButtonState::Pressed`] is acknowledged first, then exactly one
//! reconfiguration request is awaited. Further ticks see
//! [`ButtonState::Acknowledged`] and do nothing until the button is released.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::device::{DetectionCondition, DetectionMode, DeviceError, DeviceLink};
use crate::state::OrientationStore;

// Settings for the detection-mode requests the controller issues
#[derive(Clone, Debug)]
pub struct ModeToggleSettings {
    pub interval_ms: u64,
    pub condition: DetectionCondition,
}

impl Default for ModeToggleSettings {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            condition: DetectionCondition::ChangeDetection,
        }
    }
}

// Controller errors
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Failed to switch detection mode to {mode}: {source}")]
    Reconfigure {
        mode: DetectionMode,
        #[source]
        source: DeviceError,
    },
}

pub struct ModeToggleController {
    store: Arc<OrientationStore>,
    settings: ModeToggleSettings,
    active_mode: DetectionMode,
    switches: u64,
}

impl ModeToggleController {
    /// `active_mode` is the mode the device was configured with at startup.
    pub fn new(
        store: Arc<OrientationStore>,
        active_mode: DetectionMode,
        settings: ModeToggleSettings,
    ) -> Self {
        info!(
            "Creating mode toggle controller (active mode: {}, settings: {:?})",
            active_mode, settings
        );
        Self {
            store,
            settings,
            active_mode,
            switches: 0,
        }
    }

    pub fn active_mode(&self) -> DetectionMode {
        self.active_mode
    }

    /// Completed mode switches since creation.
    pub fn switches(&self) -> u64 {
        self.switches
    }

    /// One cooperative tick. Returns the mode requested on this tick, if any.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Reconfigure`] when the device rejects the request.
    /// The request is not retried and the active mode is left unchanged; the
    /// press stays acknowledged.
    pub async fn step(
        &mut self,
        link: &dyn DeviceLink,
    ) -> Result<Option<DetectionMode>, ControllerError> {
        if !self.store.acknowledge_press() {
            return Ok(None);
        }

        let target = self.active_mode.other();
        info!("Button press acknowledged, switching posture mode to {}", target);

        match link
            .set_detection_mode(target, self.settings.interval_ms, self.settings.condition)
            .await
        {
            Ok(()) => {
                self.active_mode = target;
                self.switches += 1;
                debug!("Posture mode switch #{} complete", self.switches);
                Ok(Some(target))
            }
            Err(source) => {
                error!("Failed to switch posture mode to {}: {}", target, source);
                Err(ControllerError::Reconfigure {
                    mode: target,
                    source,
                })
            }
        }
    }
}
