//! Bridge session with statum state machine
//!
//! Owns the connected link for its whole life and guarantees that every exit
//! path leaves the cube in a clean state.
//!
//! # State Machine
//!
//! ```text
//! Connected ──start()──► Streaming ──run() / shutdown()──► (teardown, consumed)
//!     │
//!     └── start() failed ──► disconnect, error returned
//! ```
//!
//! # Teardown
//!
//! Unregister sensor handler, unregister button handler, indicator off,
//! disconnect. Every step is attempted even if an earlier one fails.

use chrono::Local;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::controller::{ControllerError, ModeToggleController, ModeToggleSettings};
use crate::decoder::{button_handler, sensor_handler, ButtonDecoder, DiagnosticsSettings, SensorDecoder};
use crate::device::{DetectionMode, DeviceError, DeviceLink, IndicatorParam, NotificationHandler, NotificationKind};
use crate::render::FrameScheduler;
use crate::state::OrientationStore;

// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Teardown failed at {step}: {source}")]
    Teardown {
        step: &'static str,
        #[source]
        source: DeviceError,
    },
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub initial_mode: DetectionMode,
    pub toggle: ModeToggleSettings,
    pub indicator: IndicatorParam,
    pub frame_rate: u32,
    pub stats_interval_secs: i64,
    pub diagnostics: DiagnosticsSettings,
}

impl From<&BridgeConfig> for SessionSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            initial_mode: config.link.initial_mode,
            toggle: config.mode_toggle_settings(),
            indicator: config.indicator.param(),
            frame_rate: config.render.frame_rate,
            stats_interval_secs: config.session.stats_interval_secs,
            diagnostics: config.diagnostics.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    FrameLimit,
    SchedulerEmpty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub frames: u64,
    pub switches: u64,
    pub reason: StopReason,
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Connected, // Link up, nothing registered
    Streaming, // Handlers registered, cube configured
}

#[machine]
pub struct BridgeSession<S: SessionState> {
    link: Arc<dyn DeviceLink>,
    store: Arc<OrientationStore>,
    settings: SessionSettings,
    controller: ModeToggleController,
    sensor_handler: NotificationHandler,
    button_handler: NotificationHandler,
}

impl<S: SessionState> BridgeSession<S> {
    pub fn store(&self) -> &Arc<OrientationStore> {
        &self.store
    }

    pub fn active_mode(&self) -> DetectionMode {
        self.controller.active_mode()
    }
}

impl BridgeSession<Connected> {
    pub fn create(
        link: Arc<dyn DeviceLink>,
        store: Arc<OrientationStore>,
        settings: SessionSettings,
    ) -> Self {
        info!("Creating bridge session (initial mode: {})", settings.initial_mode);

        let sensor_handler = sensor_handler(SensorDecoder::new(
            store.clone(),
            settings.diagnostics.clone(),
        ));
        let button_handler = button_handler(ButtonDecoder::new(store.clone()));
        let controller = ModeToggleController::new(
            store.clone(),
            settings.initial_mode,
            settings.toggle.clone(),
        );

        Self::new(
            link,
            store,
            settings,
            controller,
            sensor_handler,
            button_handler,
        )
    }

    /// Registers handlers, writes the initial detection mode and lights the
    /// indicator. On failure the link is disconnected before the error is
    /// returned.
    pub async fn start(self) -> Result<BridgeSession<Streaming>, SessionError> {
        match self.configure().await {
            Ok(()) => {
                info!("Bridge session streaming");
                Ok(self.transition())
            }
            Err(e) => {
                error!("Failed to start bridge session: {}", e);
                if let Err(disconnect_error) = self.link.disconnect().await {
                    warn!("Disconnect after failed start also failed: {}", disconnect_error);
                }
                Err(e.into())
            }
        }
    }

    async fn configure(&self) -> Result<(), DeviceError> {
        debug!("Registering button handler");
        self.link
            .register_notification_handler(NotificationKind::Button, self.button_handler.clone())
            .await?;
        debug!("Registering sensor handler");
        self.link
            .register_notification_handler(NotificationKind::Sensor, self.sensor_handler.clone())
            .await?;

        self.link
            .set_detection_mode(
                self.settings.initial_mode,
                self.settings.toggle.interval_ms,
                self.settings.toggle.condition,
            )
            .await?;
        self.link.indicator_turn_on(self.settings.indicator).await?;
        Ok(())
    }
}

impl BridgeSession<Streaming> {
    /// Runs the cooperative loop, then tears down.
    ///
    /// Each iteration waits for the next frame tick, steps the mode toggle
    /// controller and then the frame scheduler. The loop ends on `shutdown`,
    /// after `max_frames` frames, when the scheduler runs out of tasks or on a
    /// controller error. A loop error takes precedence over teardown errors.
    pub async fn run(
        mut self,
        scheduler: &mut FrameScheduler,
        shutdown: CancellationToken,
        max_frames: Option<u64>,
    ) -> Result<SessionReport, SessionError> {
        let outcome = self.stream(scheduler, &shutdown, max_frames).await;
        let teardown = self.teardown().await;

        match (outcome, teardown) {
            (Ok(report), Ok(())) => {
                info!(
                    "Bridge session finished after {} frames ({:?})",
                    report.frames, report.reason
                );
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown_error)) => {
                warn!("Teardown error after session failure: {}", teardown_error);
                Err(e)
            }
        }
    }

    /// Tears down without streaming.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        info!("Shutting down bridge session");
        self.teardown().await
    }

    async fn stream(
        &mut self,
        scheduler: &mut FrameScheduler,
        shutdown: &CancellationToken,
        max_frames: Option<u64>,
    ) -> Result<SessionReport, SessionError> {
        let frame_period = Duration::from_secs_f64(1.0 / f64::from(self.settings.frame_rate.max(1)));
        let mut ticker = tokio::time::interval(frame_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let stats_interval = chrono::Duration::try_seconds(self.settings.stats_interval_secs)
            .unwrap_or(chrono::Duration::MAX);
        let mut last_stats = Local::now();
        let mut frames: u64 = 0;

        info!(
            "Entering main loop at {} fps ({} ms per frame)",
            self.settings.frame_rate,
            frame_period.as_millis()
        );

        let reason = loop {
            if max_frames.is_some_and(|limit| frames >= limit) {
                break StopReason::FrameLimit;
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break StopReason::Shutdown,
                _ = ticker.tick() => {}
            }

            if let Some(mode) = self.controller.step(self.link.as_ref()).await? {
                info!("Posture mode is now {}", mode);
            }

            let remaining = scheduler.step();
            frames += 1;

            let now = Local::now();
            if now.signed_duration_since(last_stats) >= stats_interval {
                let (eulers, quaternions) = self.store.published_counts();
                info!(
                    "Session stats: {} frames, {} Euler and {} quaternion samples, {} mode switches",
                    frames,
                    eulers,
                    quaternions,
                    self.controller.switches()
                );
                if let Some(updated_at) = self.store.diagnostics().updated_at {
                    debug!(
                        "Last diagnostics update at {}",
                        updated_at.format("%H:%M:%S%.3f")
                    );
                }
                last_stats = now;
            }

            if remaining == 0 {
                break StopReason::SchedulerEmpty;
            }
        };

        Ok(SessionReport {
            frames,
            switches: self.controller.switches(),
            reason,
        })
    }

    async fn teardown(&self) -> Result<(), SessionError> {
        let mut first_error: Option<SessionError> = None;
        let mut record = |step: &'static str, result: Result<(), DeviceError>| {
            if let Err(source) = result {
                error!("Teardown step '{}' failed: {}", step, source);
                first_error.get_or_insert(SessionError::Teardown { step, source });
            }
        };

        record(
            "unregister sensor handler",
            self.link
                .unregister_notification_handler(NotificationKind::Sensor, &self.sensor_handler)
                .await,
        );
        record(
            "unregister button handler",
            self.link
                .unregister_notification_handler(NotificationKind::Button, &self.button_handler)
                .await,
        );
        record("indicator off", self.link.indicator_turn_off_all().await);
        record("disconnect", self.link.disconnect().await);

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Teardown complete");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{LinkRequest, SimulatedLink, SimulationSettings};
    use crate::render::{OrientationConsumer, TransformNode};
    use std::path::PathBuf;

    fn session() -> (BridgeSession<Connected>, SimulatedLink) {
        let link = SimulatedLink::spawn(SimulationSettings::manual());
        let store = Arc::new(OrientationStore::new());
        let settings = SessionSettings::from(&BridgeConfig::default());
        let session = BridgeSession::create(Arc::new(link.clone()), store, settings);
        (session, link)
    }

    fn scheduler(store: &Arc<OrientationStore>) -> FrameScheduler {
        let mut scheduler = FrameScheduler::new();
        let node = TransformNode::new("cube", PathBuf::from("cube.fbx"), 1.0);
        scheduler.add(Box::new(OrientationConsumer::new(store.clone(), node)));
        scheduler
    }

    fn teardown_requests() -> Vec<LinkRequest> {
        vec![
            LinkRequest::Unregister(NotificationKind::Sensor),
            LinkRequest::Unregister(NotificationKind::Button),
            LinkRequest::IndicatorOffAll,
            LinkRequest::Disconnect,
        ]
    }

    #[tokio::test]
    async fn start_registers_button_then_sensor() {
        let (session, link) = session();
        let session = session.start().await.unwrap();

        let requests = link.requests();
        assert_eq!(requests[0], LinkRequest::Register(NotificationKind::Button));
        assert_eq!(requests[1], LinkRequest::Register(NotificationKind::Sensor));
        assert!(matches!(requests[2], LinkRequest::SetDetectionMode(_)));
        assert!(matches!(requests[3], LinkRequest::IndicatorOn(_)));
        assert_eq!(link.detection_modes(), vec![DetectionMode::Euler]);
        assert_eq!(link.handler_count(NotificationKind::Sensor), 1);
        assert_eq!(session.active_mode(), DetectionMode::Euler);
    }

    #[tokio::test]
    async fn failed_start_disconnects() {
        let (session, link) = session();
        link.fail_next_request("no services");

        let result = session.start().await;
        assert!(matches!(result, Err(SessionError::Device(DeviceError::RequestError(_)))));
        assert!(!link.is_connected());
        assert_eq!(link.requests().last(), Some(&LinkRequest::Disconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn frame_limit_ends_loop_with_ordered_teardown() {
        let (session, link) = session();
        let store = session.store().clone();
        let session = session.start().await.unwrap();
        let mut scheduler = scheduler(&store);

        link.inject(NotificationKind::Sensor, &[0x03, 0x01, 10, 0, 20, 0, 30, 0]);
        let report = session
            .run(&mut scheduler, CancellationToken::new(), Some(3))
            .await
            .unwrap();

        assert_eq!(report.frames, 3);
        assert_eq!(report.reason, StopReason::FrameLimit);
        assert!(!store.euler_pending());
        let requests = link.requests();
        assert_eq!(requests[requests.len() - 4..], teardown_requests()[..]);
        assert!(!link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn button_press_switches_mode_during_loop() {
        let (session, link) = session();
        let store = session.store().clone();
        let session = session.start().await.unwrap();
        let mut scheduler = scheduler(&store);

        link.inject(NotificationKind::Button, &[0x01, 0x80]);
        let report = session
            .run(&mut scheduler, CancellationToken::new(), Some(5))
            .await
            .unwrap();

        assert_eq!(report.switches, 1);
        assert_eq!(
            link.detection_modes(),
            vec![DetectionMode::Euler, DetectionMode::Quaternion]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn controller_error_still_tears_down() {
        let (session, link) = session();
        let store = session.store().clone();
        let session = session.start().await.unwrap();
        let mut scheduler = scheduler(&store);

        link.inject(NotificationKind::Button, &[0x01, 0x80]);
        link.fail_next_request("write rejected");
        let result = session
            .run(&mut scheduler, CancellationToken::new(), Some(5))
            .await;

        assert!(matches!(result, Err(SessionError::Controller(_))));
        let requests = link.requests();
        assert_eq!(requests[requests.len() - 4..], teardown_requests()[..]);
    }

    #[tokio::test]
    async fn cancelled_shutdown_stops_before_first_frame() {
        let (session, link) = session();
        let store = session.store().clone();
        let session = session.start().await.unwrap();
        let mut scheduler = scheduler(&store);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let report = session.run(&mut scheduler, shutdown, None).await.unwrap();

        assert_eq!(report.frames, 0);
        assert_eq!(report.reason, StopReason::Shutdown);
        assert!(!link.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_scheduler_ends_loop() {
        let (session, _link) = session();
        let session = session.start().await.unwrap();
        let mut scheduler = FrameScheduler::new();

        let report = session
            .run(&mut scheduler, CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(report.reason, StopReason::SchedulerEmpty);
        assert_eq!(report.frames, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_stats_interval_does_not_panic() {
        let link = SimulatedLink::spawn(SimulationSettings::manual());
        let store = Arc::new(OrientationStore::new());
        let mut settings = SessionSettings::from(&BridgeConfig::default());
        settings.stats_interval_secs = i64::MAX;
        let session = BridgeSession::create(Arc::new(link.clone()), store.clone(), settings)
            .start()
            .await
            .unwrap();
        let mut scheduler = scheduler(&store);

        let report = session
            .run(&mut scheduler, CancellationToken::new(), Some(2))
            .await
            .unwrap();
        assert_eq!(report.frames, 2);
    }

    #[tokio::test]
    async fn shutdown_without_streaming_tears_down() {
        let (session, link) = session();
        let session = session.start().await.unwrap();
        session.shutdown().await.unwrap();

        let requests = link.requests();
        assert_eq!(requests[4..], teardown_requests()[..]);
    }

    #[tokio::test]
    async fn first_teardown_error_is_reported_and_remaining_steps_run() {
        let (session, link) = session();
        let session = session.start().await.unwrap();
        link.fail_next_request("busy");

        let result = session.shutdown().await;
        assert!(matches!(
            result,
            Err(SessionError::Teardown { step: "unregister sensor handler", .. })
        ));
        assert!(!link.is_connected());
        assert_eq!(link.requests().last(), Some(&LinkRequest::Disconnect));
    }
}
