//! In-process cube
//!
//! Implements the device link without hardware. Requests go through the wire
//! codec in both directions, so the simulated cube streams whatever posture
//! representation was last written to its configuration. Tests use it to
//! inject raw payloads, inspect the request log and force request failures.

use async_trait::async_trait;
use glam::{EulerRot, Quat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::link::{DeviceConnector, DeviceError, DeviceLink, NotificationHandler, NotificationKind};
use super::protocol::{
    decode_detection_mode, encode_detection_mode, encode_indicator_off_all, encode_indicator_on,
    ButtonFrame, DetectionCondition, DetectionMode, DetectionRequest, EulerFrame, IndicatorParam,
    QuaternionFrame, SensorFrame,
};
use crate::state::store::QUATERNION_SCALE;

// Simulation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Posture notification period, 0 disables the motion task
    pub motion_period_ms: u64,
    /// Scripted press every period, 0 disables the button task
    pub button_period_ms: u64,
    pub button_hold_ms: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            motion_period_ms: 100,
            button_period_ms: 5000,
            button_hold_ms: 200,
        }
    }
}

impl SimulationSettings {
    /// No background tasks; payloads only arrive through [`SimulatedLink::inject`].
    pub fn manual() -> Self {
        Self {
            motion_period_ms: 0,
            button_period_ms: 0,
            button_hold_ms: 0,
        }
    }
}

/// Request as seen by the simulated cube.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkRequest {
    Register(NotificationKind),
    Unregister(NotificationKind),
    SetDetectionMode(DetectionRequest),
    IndicatorOn(IndicatorParam),
    IndicatorOffAll,
    Disconnect,
}

pub struct SimulatedConnector {
    settings: SimulationSettings,
    connect_delay: Duration,
    failure: Option<String>,
}

impl SimulatedConnector {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            connect_delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

#[async_trait]
impl DeviceConnector for SimulatedConnector {
    type Link = SimulatedLink;

    async fn connect(&self) -> Result<SimulatedLink, DeviceError> {
        info!("Searching for simulated cube");
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if let Some(reason) = &self.failure {
            warn!("Simulated cube refused connection: {}", reason);
            return Err(DeviceError::ConnectionError(reason.clone()));
        }
        let link = SimulatedLink::spawn(self.settings.clone());
        info!("Connected to simulated cube");
        Ok(link)
    }
}

#[derive(Debug)]
struct SimulatedCube {
    handlers: Mutex<HashMap<NotificationKind, Vec<NotificationHandler>>>,
    requests: Mutex<Vec<LinkRequest>>,
    pending_failure: Mutex<Option<String>>,
    detection: watch::Sender<Option<DetectionRequest>>,
    connected: AtomicBool,
    shutdown: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedCube {
    fn dispatch(&self, kind: NotificationKind, payload: &[u8]) {
        // Call outside the lock so a handler may unregister itself
        let handlers = lock(&self.handlers).get(&kind).cloned().unwrap_or_default();
        debug!(
            "Dispatching {} payload {:02x?} to {} handlers",
            kind,
            payload,
            handlers.len()
        );
        for handler in handlers {
            handler.call(payload);
        }
    }

    fn begin_request(&self, request: LinkRequest) -> Result<(), DeviceError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(DeviceError::Disconnected);
        }
        lock(&self.requests).push(request);
        if let Some(reason) = lock(&self.pending_failure).take() {
            warn!("Simulated request failure: {}", reason);
            return Err(DeviceError::RequestError(reason));
        }
        Ok(())
    }
}

/// Connected simulated cube. Clones share the same cube.
#[derive(Clone, Debug)]
pub struct SimulatedLink {
    cube: Arc<SimulatedCube>,
}

impl SimulatedLink {
    /// Creates a connected cube and starts its background tasks.
    pub fn spawn(settings: SimulationSettings) -> Self {
        let (detection, _) = watch::channel(None);
        let cube = Arc::new(SimulatedCube {
            handlers: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            pending_failure: Mutex::new(None),
            detection,
            connected: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
        });

        if settings.motion_period_ms > 0 {
            tokio::spawn(run_motion(
                cube.clone(),
                Duration::from_millis(settings.motion_period_ms),
            ));
        }
        if settings.button_period_ms > 0 {
            tokio::spawn(run_button_script(
                cube.clone(),
                Duration::from_millis(settings.button_period_ms),
                Duration::from_millis(settings.button_hold_ms),
            ));
        }

        Self { cube }
    }

    /// Delivers a raw payload to the handlers registered for `kind`.
    pub fn inject(&self, kind: NotificationKind, payload: &[u8]) {
        self.cube.dispatch(kind, payload);
    }

    /// Makes the next request return [`DeviceError::RequestError`].
    pub fn fail_next_request(&self, reason: impl Into<String>) {
        *lock(&self.cube.pending_failure) = Some(reason.into());
    }

    pub fn requests(&self) -> Vec<LinkRequest> {
        lock(&self.cube.requests).clone()
    }

    /// Modes of all detection-mode writes, in order.
    pub fn detection_modes(&self) -> Vec<DetectionMode> {
        lock(&self.cube.requests)
            .iter()
            .filter_map(|request| match request {
                LinkRequest::SetDetectionMode(detection) => Some(detection.mode),
                _ => None,
            })
            .collect()
    }

    pub fn handler_count(&self, kind: NotificationKind) -> usize {
        lock(&self.cube.handlers).get(&kind).map_or(0, Vec::len)
    }

    pub fn current_detection(&self) -> Option<DetectionRequest> {
        *self.cube.detection.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.cube.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceLink for SimulatedLink {
    async fn register_notification_handler(
        &self,
        kind: NotificationKind,
        handler: NotificationHandler,
    ) -> Result<(), DeviceError> {
        self.cube.begin_request(LinkRequest::Register(kind))?;
        debug!("Registering {} handler {}", kind, handler.id());
        lock(&self.cube.handlers)
            .entry(kind)
            .or_default()
            .push(handler);
        Ok(())
    }

    async fn unregister_notification_handler(
        &self,
        kind: NotificationKind,
        handler: &NotificationHandler,
    ) -> Result<(), DeviceError> {
        self.cube.begin_request(LinkRequest::Unregister(kind))?;
        let mut handlers = lock(&self.cube.handlers);
        let registered = handlers.entry(kind).or_default();
        let before = registered.len();
        registered.retain(|h| h != handler);
        if registered.len() == before {
            return Err(DeviceError::HandlerError(format!(
                "{} handler {} was not registered",
                kind,
                handler.id()
            )));
        }
        debug!("Unregistered {} handler {}", kind, handler.id());
        Ok(())
    }

    async fn set_detection_mode(
        &self,
        mode: DetectionMode,
        interval_ms: u64,
        condition: DetectionCondition,
    ) -> Result<(), DeviceError> {
        let bytes = encode_detection_mode(mode, interval_ms, condition);
        let request = decode_detection_mode(&bytes).ok_or_else(|| {
            DeviceError::RequestError(format!("Malformed configuration write {:02x?}", bytes))
        })?;
        self.cube
            .begin_request(LinkRequest::SetDetectionMode(request))?;
        debug!("Configuration write {:02x?}", bytes);
        self.cube.detection.send_replace(Some(request));
        info!(
            "Simulated cube now streams {} posture every {} ms",
            request.mode, request.interval_ms
        );
        Ok(())
    }

    async fn indicator_turn_on(&self, param: IndicatorParam) -> Result<(), DeviceError> {
        self.cube.begin_request(LinkRequest::IndicatorOn(param))?;
        debug!("Indicator write {:02x?}", encode_indicator_on(&param));
        Ok(())
    }

    async fn indicator_turn_off_all(&self) -> Result<(), DeviceError> {
        self.cube.begin_request(LinkRequest::IndicatorOffAll)?;
        debug!("Indicator write {:02x?}", encode_indicator_off_all());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        if !self.is_connected() {
            debug!("Simulated cube already disconnected");
            return Ok(());
        }
        lock(&self.cube.requests).push(LinkRequest::Disconnect);
        self.cube.shutdown.cancel();
        self.cube.connected.store(false, Ordering::SeqCst);
        lock(&self.cube.handlers).clear();
        info!("Simulated cube disconnected");
        Ok(())
    }
}

/// Synthetic motion in degrees as (roll, pitch, yaw).
fn posture_at(elapsed: Duration) -> (f32, f32, f32) {
    let t = elapsed.as_secs_f32();
    let yaw = (t * 30.0 + 180.0).rem_euclid(360.0) - 180.0;
    let pitch = 20.0 * (t * 0.7).sin();
    let roll = 10.0 * (t * 1.3).sin();
    (roll, pitch, yaw)
}

fn to_fixed_point(value: f32) -> i16 {
    (value * QUATERNION_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn posture_frame(mode: DetectionMode, (roll, pitch, yaw): (f32, f32, f32)) -> SensorFrame {
    match mode {
        DetectionMode::Euler => SensorFrame::Euler(EulerFrame {
            roll: roll.round() as i16,
            pitch: pitch.round() as i16,
            yaw: yaw.round() as i16,
        }),
        DetectionMode::Quaternion => {
            // extrinsic x-y-z, same convention the device uses for its Euler report
            let q = Quat::from_euler(
                EulerRot::ZYX,
                yaw.to_radians(),
                pitch.to_radians(),
                roll.to_radians(),
            );
            SensorFrame::Quaternion(QuaternionFrame {
                w: to_fixed_point(q.w),
                x: to_fixed_point(q.x),
                y: to_fixed_point(q.y),
                z: to_fixed_point(q.z),
            })
        }
    }
}

async fn run_motion(cube: Arc<SimulatedCube>, period: Duration) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(period);
    let mut last_sent: Option<SensorFrame> = None;

    info!("Simulated motion task started ({} ms)", period.as_millis());
    loop {
        tokio::select! {
            _ = cube.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(detection) = *cube.detection.borrow() else {
            continue;
        };

        let frame = posture_frame(detection.mode, posture_at(started.elapsed()));
        if detection.condition == DetectionCondition::ChangeDetection && last_sent == Some(frame)
        {
            continue;
        }
        cube.dispatch(NotificationKind::Sensor, &frame.encode());
        last_sent = Some(frame);
    }
    debug!("Simulated motion task finished");
}

async fn run_button_script(cube: Arc<SimulatedCube>, period: Duration, hold: Duration) {
    info!(
        "Simulated button task started (press every {} ms)",
        period.as_millis()
    );
    loop {
        tokio::select! {
            _ = cube.shutdown.cancelled() => break,
            _ = tokio::time::sleep(period) => {}
        }
        cube.dispatch(NotificationKind::Button, &ButtonFrame::Pressed.encode());

        tokio::select! {
            _ = cube.shutdown.cancelled() => break,
            _ = tokio::time::sleep(hold) => {}
        }
        cube.dispatch(NotificationKind::Button, &ButtonFrame::Released.encode());
    }
    debug!("Simulated button task finished");
}
