use chrono::{DateTime, Local};
use glam::Quat;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Fixed-point scale of quaternion components on the wire.
pub const QUATERNION_SCALE: f32 = 10000.0;

// Euler posture in degrees (roll -> x, pitch -> y, yaw -> z)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EulerSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl EulerSample {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Quaternion posture as reported by the device.
///
/// Components are the raw fixed-point values divided by [`QUATERNION_SCALE`].
/// Nothing renormalizes them afterwards, so a sample may be slightly off the
/// unit sphere.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuaternionSample {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl QuaternionSample {
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Scales raw fixed-point components into a sample.
    pub fn from_fixed_point(w: i16, x: i16, y: i16, z: i16) -> Self {
        Self {
            w: w as f32 / QUATERNION_SCALE,
            x: x as f32 / QUATERNION_SCALE,
            y: y as f32 / QUATERNION_SCALE,
            z: z as f32 / QUATERNION_SCALE,
        }
    }

    /// Engine-native quaternion with the components copied as-is.
    pub fn to_quat(self) -> Quat {
        Quat::from_xyzw(self.x, self.y, self.z, self.w)
    }
}

// Button state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
    Acknowledged,
}

/// Payload plus dirty flag for one posture kind.
///
/// One producer publishes, one consumer takes. `publish` always replaces the
/// payload, so the consumer sees the latest value of the kind.
#[derive(Debug, Default)]
pub struct UpdateCell<T> {
    inner: Mutex<CellSlot<T>>,
}

#[derive(Debug, Default)]
struct CellSlot<T> {
    value: T,
    dirty: bool,
    published: u64,
}

impl<T: Copy> UpdateCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(CellSlot {
                value,
                dirty: false,
                published: 0,
            }),
        }
    }

    fn slot(&self) -> MutexGuard<'_, CellSlot<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` and marks the cell dirty.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot();
        slot.value = value;
        slot.dirty = true;
        slot.published += 1;
    }

    /// Returns the value and clears the flag, or `None` when nothing is pending.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.slot();
        if slot.dirty {
            slot.dirty = false;
            Some(slot.value)
        } else {
            None
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.slot().dirty
    }

    /// Latest value regardless of the flag.
    pub fn latest(&self) -> T {
        self.slot().value
    }

    /// Number of publishes since creation.
    pub fn published(&self) -> u64 {
        self.slot().published
    }
}

/// Derived copies computed by the decoders for logging only.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiagnosticSnapshot {
    pub emulated_euler: Option<EulerSample>,
    pub emulated_quaternion: Option<QuaternionSample>,
    pub updated_at: Option<DateTime<Local>>,
}

/// Process-wide orientation state shared by decoders, controller and renderer.
///
/// Created once by the composition root and handed out as `Arc<OrientationStore>`.
#[derive(Debug, Default)]
pub struct OrientationStore {
    button: Mutex<ButtonState>,
    euler: UpdateCell<EulerSample>,
    quaternion: UpdateCell<QuaternionSample>,
    diagnostics: Mutex<DiagnosticSnapshot>,
}

impl OrientationStore {
    pub fn new() -> Self {
        info!("Creating orientation store");
        Self::default()
    }

    fn button(&self) -> MutexGuard<'_, ButtonState> {
        self.button.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn button_state(&self) -> ButtonState {
        *self.button()
    }

    /// Press notification. Only a released button becomes pressed; a press
    /// that is already pending or acknowledged stays as it is.
    pub fn press(&self) -> ButtonState {
        let mut state = self.button();
        if *state == ButtonState::Released {
            *state = ButtonState::Pressed;
            debug!("Button state: Released -> Pressed");
        } else {
            debug!("Ignoring repeated press while {:?}", *state);
        }
        *state
    }

    /// Release notification, accepted from any state.
    pub fn release(&self) -> ButtonState {
        let mut state = self.button();
        if *state != ButtonState::Released {
            debug!("Button state: {:?} -> Released", *state);
        }
        *state = ButtonState::Released;
        *state
    }

    /// Moves Pressed to Acknowledged. Returns `true` when this call did the
    /// transition, which happens at most once per press.
    pub fn acknowledge_press(&self) -> bool {
        let mut state = self.button();
        if *state == ButtonState::Pressed {
            *state = ButtonState::Acknowledged;
            debug!("Button state: Pressed -> Acknowledged");
            true
        } else {
            false
        }
    }

    pub fn publish_euler(&self, sample: EulerSample) {
        self.euler.publish(sample);
    }

    pub fn publish_quaternion(&self, sample: QuaternionSample) {
        self.quaternion.publish(sample);
    }

    pub fn take_euler(&self) -> Option<EulerSample> {
        self.euler.take()
    }

    pub fn take_quaternion(&self) -> Option<QuaternionSample> {
        self.quaternion.take()
    }

    pub fn euler_pending(&self) -> bool {
        self.euler.is_dirty()
    }

    pub fn quaternion_pending(&self) -> bool {
        self.quaternion.is_dirty()
    }

    pub fn last_euler(&self) -> EulerSample {
        self.euler.latest()
    }

    pub fn last_quaternion(&self) -> QuaternionSample {
        self.quaternion.latest()
    }

    /// Publish counters as (euler, quaternion).
    pub fn published_counts(&self) -> (u64, u64) {
        (self.euler.published(), self.quaternion.published())
    }

    pub fn record_emulated_euler(&self, sample: EulerSample) {
        let mut snapshot = self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        snapshot.emulated_euler = Some(sample);
        snapshot.updated_at = Some(Local::now());
    }

    pub fn record_emulated_quaternion(&self, sample: QuaternionSample) {
        let mut snapshot = self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        snapshot.emulated_quaternion = Some(sample);
        snapshot.updated_at = Some(Local::now());
    }

    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        *self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_take_clears_flag_and_keeps_value() {
        let cell = UpdateCell::new(EulerSample::default());
        assert!(cell.take().is_none());

        cell.publish(EulerSample::new(1.0, 2.0, 3.0));
        assert!(cell.is_dirty());
        assert_eq!(cell.take(), Some(EulerSample::new(1.0, 2.0, 3.0)));
        assert!(!cell.is_dirty());
        assert!(cell.take().is_none());
        assert_eq!(cell.latest(), EulerSample::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn cell_publish_replaces_pending_value() {
        let cell = UpdateCell::new(EulerSample::default());
        cell.publish(EulerSample::new(1.0, 0.0, 0.0));
        cell.publish(EulerSample::new(5.0, 0.0, 0.0));

        assert_eq!(cell.take(), Some(EulerSample::new(5.0, 0.0, 0.0)));
        assert_eq!(cell.published(), 2);
    }

    #[test]
    fn flags_are_independent() {
        let store = OrientationStore::new();
        store.publish_euler(EulerSample::new(1.0, 2.0, 3.0));
        store.publish_quaternion(QuaternionSample::new(1.0, 0.0, 0.0, 0.0));

        assert!(store.euler_pending());
        assert!(store.quaternion_pending());

        store.take_quaternion();
        assert!(store.euler_pending());
        assert!(!store.quaternion_pending());
    }

    #[test]
    fn press_acknowledge_release_cycle() {
        let store = OrientationStore::new();
        assert_eq!(store.button_state(), ButtonState::Released);
        assert!(!store.acknowledge_press());

        assert_eq!(store.press(), ButtonState::Pressed);
        assert!(store.acknowledge_press());
        assert!(!store.acknowledge_press());
        assert_eq!(store.button_state(), ButtonState::Acknowledged);

        // repeated press does not re-arm the acknowledged button
        assert_eq!(store.press(), ButtonState::Acknowledged);

        assert_eq!(store.release(), ButtonState::Released);
    }

    #[test]
    fn release_resets_from_pressed() {
        let store = OrientationStore::new();
        store.press();
        assert_eq!(store.release(), ButtonState::Released);
        assert!(!store.acknowledge_press());
    }

    #[test]
    fn diagnostics_record_timestamp() {
        let store = OrientationStore::new();
        assert!(store.diagnostics().updated_at.is_none());

        let before = Local::now();
        store.record_emulated_euler(EulerSample::new(1.0, 2.0, 3.0));
        let snapshot = store.diagnostics();
        assert_eq!(snapshot.emulated_euler, Some(EulerSample::new(1.0, 2.0, 3.0)));
        assert!(snapshot.updated_at.is_some_and(|at| at >= before));
    }

    #[test]
    fn fixed_point_scaling_is_not_normalized() {
        let sample = QuaternionSample::from_fixed_point(5000, 0, 0, 0);
        assert_eq!(sample, QuaternionSample::new(0.5, 0.0, 0.0, 0.0));
        assert!((sample.to_quat().length() - 0.5).abs() < 1e-6);
    }
}
