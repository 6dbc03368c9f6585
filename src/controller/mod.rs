//! Button-driven posture mode control
//!
//! [`mode_toggle`] turns a debounced button press into exactly one detection
//! mode request per physical press:
//!
//! ```text
//! Released ──press──► Pressed ──tick──► Acknowledged ──release──► Released
//!                                 │
//!                                 └──► set_detection_mode(other mode)
//! ```

pub mod mode_toggle;

pub use mode_toggle::{ControllerError, ModeToggleController, ModeToggleSettings};
