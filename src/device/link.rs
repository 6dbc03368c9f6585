//! Device link contract
//!
//! The bridge talks to the cube only through [`DeviceConnector`] and
//! [`DeviceLink`]. Discovery and pairing happen behind `connect()`.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::protocol::{DetectionCondition, DetectionMode, IndicatorParam};

/// Notification source on the cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Sensor,
    Button,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Sensor => write!(f, "sensor"),
            NotificationKind::Button => write!(f, "button"),
        }
    }
}

type Callback = dyn Fn(&[u8]) + Send + Sync;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Callback invoked with each raw notification payload.
///
/// Clones share the same id, which is what unregistration matches on.
#[derive(Clone)]
pub struct NotificationHandler {
    id: u64,
    callback: Arc<Callback>,
}

impl NotificationHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        Self {
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn call(&self, payload: &[u8]) {
        (self.callback)(payload)
    }
}

impl fmt::Debug for NotificationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHandler")
            .field("id", &self.id)
            .finish()
    }
}

impl PartialEq for NotificationHandler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// Device link errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to connect: {0}")]
    ConnectionError(String),

    #[error("Connection timed out after {0} ms")]
    ConnectTimeout(u64),

    #[error("Request failed: {0}")]
    RequestError(String),

    #[error("Handler error: {0}")]
    HandlerError(String),

    #[error("Link is disconnected")]
    Disconnected,
}

/// Yields a connected link.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    type Link: DeviceLink + 'static;

    async fn connect(&self) -> Result<Self::Link, DeviceError>;
}

/// Requests the bridge issues to a connected cube. Every request is awaited.
#[async_trait]
pub trait DeviceLink: Send + Sync + fmt::Debug {
    async fn register_notification_handler(
        &self,
        kind: NotificationKind,
        handler: NotificationHandler,
    ) -> Result<(), DeviceError>;

    async fn unregister_notification_handler(
        &self,
        kind: NotificationKind,
        handler: &NotificationHandler,
    ) -> Result<(), DeviceError>;

    async fn set_detection_mode(
        &self,
        mode: DetectionMode,
        interval_ms: u64,
        condition: DetectionCondition,
    ) -> Result<(), DeviceError>;

    async fn indicator_turn_on(&self, param: IndicatorParam) -> Result<(), DeviceError>;

    async fn indicator_turn_off_all(&self) -> Result<(), DeviceError>;

    async fn disconnect(&self) -> Result<(), DeviceError>;
}

/// Connects through `connector`, giving up after `timeout_ms`.
pub async fn connect_with_timeout<C: DeviceConnector>(
    connector: &C,
    timeout_ms: u64,
) -> Result<C::Link, DeviceError> {
    info!("Connecting to cube (timeout {} ms)", timeout_ms);
    match tokio::time::timeout(Duration::from_millis(timeout_ms), connector.connect()).await {
        Ok(connected) => connected,
        Err(_) => {
            error!("No cube connected within {} ms", timeout_ms);
            Err(DeviceError::ConnectTimeout(timeout_ms))
        }
    }
}
