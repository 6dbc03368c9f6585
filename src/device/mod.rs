//! Device link to the motion-sensing cube
//!
//! - [`link`] - the async contract the bridge consumes ([`DeviceConnector`], [`DeviceLink`])
//! - [`protocol`] - binary notification and request payloads
//! - [`simulated`] - an in-process cube implementing the contract
//!
//! # Architecture
//!
//! ```text
//! DeviceConnector::connect() ──► DeviceLink ──[notifications]──► NotificationHandler
//!                                    ▲
//!                                    └──[requests: mode, indicator, handlers]── bridge
//! ```

pub mod link;
pub mod protocol;
pub mod simulated;

pub use link::{connect_with_timeout, DeviceConnector, DeviceError, DeviceLink, NotificationHandler, NotificationKind};
pub use protocol::{Color, DetectionCondition, DetectionMode, IndicatorParam};
pub use simulated::{LinkRequest, SimulatedConnector, SimulatedLink, SimulationSettings};
