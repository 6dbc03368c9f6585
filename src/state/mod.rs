//! Shared orientation state
//!
//! Holds the single [`OrientationStore`] that sits between the device link and
//! the per-frame consumers:
//!
//! ```text
//! Sensor/Button callbacks ──► OrientationStore ◄── ModeToggleController
//!   (publish, press/release)                    ◄── OrientationConsumer
//!                                                   (acknowledge, take)
//! ```
//!
//! Every field has exactly one writer role. Each posture kind is carried by an
//! [`UpdateCell`], so a sample written between two frames is seen by the next
//! frame and never merged with an older one.

pub mod store;

pub use store::{
    ButtonState, DiagnosticSnapshot, EulerSample, OrientationStore, QuaternionSample, UpdateCell,
};
