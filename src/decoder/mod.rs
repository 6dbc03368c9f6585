//! Notification decoders
//!
//! Turn raw device payloads into store updates:
//!
//! 1. [`sensor`] - posture frames (Euler or quaternion) and their diagnostics
//! 2. [`button`] - press/release transitions
//! 3. [`diagnostics`] - axis-order conversions that are logged, never dispatched
//!
//! Payloads that do not belong to a decoder are dropped without an error.
//! [`sensor_handler`] and [`button_handler`] wrap the decoders into callbacks
//! for the device link.

pub mod button;
pub mod diagnostics;
pub mod sensor;

pub use button::ButtonDecoder;
pub use diagnostics::{AxisOrder, DiagnosticsSettings};
pub use sensor::{SensorDecoder, SensorEvent};

use crate::device::link::NotificationHandler;

pub fn sensor_handler(decoder: SensorDecoder) -> NotificationHandler {
    NotificationHandler::new(move |payload| {
        decoder.handle(payload);
    })
}

pub fn button_handler(decoder: ButtonDecoder) -> NotificationHandler {
    NotificationHandler::new(move |payload| {
        decoder.handle(payload);
    })
}
