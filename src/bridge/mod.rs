//! Bridge session lifecycle
//!
//! ```text
//! DeviceConnector::connect ──► BridgeSession<Connected>
//!                                   │ start()
//!                                   ▼
//!                             BridgeSession<Streaming> ──run()──► teardown
//! ```
//!
//! The session owns the link, the decoders' handlers and the mode toggle
//! controller. The render side is handed in as a [`FrameScheduler`].
//!
//! [`FrameScheduler`]: crate::render::FrameScheduler

pub mod session;

pub use session::{BridgeSession, SessionError, SessionReport, SessionSettings, StopReason};
