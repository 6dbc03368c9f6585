use std::sync::Arc;
use tracing::{debug, info, warn};

use super::diagnostics::{decompose_sample, euler_round_trip, AxisOrder, DiagnosticsSettings};
use crate::device::protocol::SensorFrame;
use crate::state::{EulerSample, OrientationStore, QuaternionSample};

/// Order used for the Euler round trip.
const ROUND_TRIP_ORDER: AxisOrder = AxisOrder::Xyz;

/// What a sensor payload turned into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SensorEvent {
    Euler(EulerSample),
    Quaternion(QuaternionSample),
}

/// Decodes sensor notifications into the store.
#[derive(Clone, Debug)]
pub struct SensorDecoder {
    store: Arc<OrientationStore>,
    diagnostics: DiagnosticsSettings,
}

impl SensorDecoder {
    pub fn new(store: Arc<OrientationStore>, diagnostics: DiagnosticsSettings) -> Self {
        debug!(
            "Creating sensor decoder with diagnostics: {:?}",
            diagnostics
        );
        Self { store, diagnostics }
    }

    /// Handles one raw notification. Returns `None` for payloads that are not
    /// posture frames; those leave the store untouched.
    pub fn handle(&self, payload: &[u8]) -> Option<SensorEvent> {
        match SensorFrame::parse(payload)? {
            SensorFrame::Euler(frame) => {
                let sample = EulerSample::new(frame.roll as f32, frame.pitch as f32, frame.yaw as f32);
                self.store.publish_euler(sample);
                info!(
                    "Euler: x:{}, y:{}, z:{}",
                    frame.roll, frame.pitch, frame.yaw
                );
                if self.diagnostics.enabled {
                    self.log_euler_round_trip(sample);
                }
                Some(SensorEvent::Euler(sample))
            }
            SensorFrame::Quaternion(frame) => {
                let sample = QuaternionSample::from_fixed_point(frame.w, frame.x, frame.y, frame.z);
                self.store.publish_quaternion(sample);
                info!(
                    "Quaternion: x:{}, y:{}, z:{}, w:{}",
                    sample.x, sample.y, sample.z, sample.w
                );
                if self.diagnostics.enabled {
                    self.log_quaternion_decomposition(sample);
                }
                Some(SensorEvent::Quaternion(sample))
            }
        }
    }

    fn log_euler_round_trip(&self, sample: EulerSample) {
        let trip = euler_round_trip(ROUND_TRIP_ORDER, sample);
        info!(
            "Emulated Quaternion: x:{:.4}, y:{:.4}, z:{:.4}, w:{:.4}",
            trip.quaternion.x, trip.quaternion.y, trip.quaternion.z, trip.quaternion.w
        );
        info!(
            "Emulated Euler {}: x:{:.4}, y:{:.4}, z:{:.4}",
            ROUND_TRIP_ORDER, trip.euler.x, trip.euler.y, trip.euler.z
        );
        self.store.record_emulated_quaternion(trip.quaternion);
        self.store.record_emulated_euler(trip.euler);
    }

    fn log_quaternion_decomposition(&self, sample: QuaternionSample) {
        for (index, order) in self.diagnostics.axis_orders.iter().enumerate() {
            let Some(euler) = decompose_sample(*order, sample) else {
                warn!("Quaternion has zero length, skipping Euler decomposition");
                return;
            };
            info!(
                "Emulated Euler {}: x:{:.4}, y:{:.4}, z:{:.4}",
                order, euler.x, euler.y, euler.z
            );
            if index == 0 {
                self.store.record_emulated_euler(euler);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::protocol::{EulerFrame, QuaternionFrame};

    const EPSILON: f32 = 1e-2;

    fn decoder() -> (SensorDecoder, Arc<OrientationStore>) {
        let store = Arc::new(OrientationStore::new());
        (
            SensorDecoder::new(store.clone(), DiagnosticsSettings::default()),
            store,
        )
    }

    fn quaternion_payload(w: i16, x: i16, y: i16, z: i16) -> Vec<u8> {
        SensorFrame::Quaternion(QuaternionFrame { w, x, y, z }).encode()
    }

    fn euler_payload(roll: i16, pitch: i16, yaw: i16) -> Vec<u8> {
        SensorFrame::Euler(EulerFrame { roll, pitch, yaw }).encode()
    }

    #[test]
    fn quaternion_frame_is_scaled_and_flagged() {
        let (decoder, store) = decoder();
        let frames = [
            (10000, 0, 0, 0),
            (7071, 0, 0, 7071),
            (-32768, 32767, -1, 1),
            (0, 0, 0, 0),
        ];
        for (w, x, y, z) in frames {
            let event = decoder.handle(&quaternion_payload(w, x, y, z));
            let expected = QuaternionSample::new(
                w as f32 / 10000.0,
                x as f32 / 10000.0,
                y as f32 / 10000.0,
                z as f32 / 10000.0,
            );
            assert_eq!(event, Some(SensorEvent::Quaternion(expected)));
            assert_eq!(store.last_quaternion(), expected);
            assert!(store.quaternion_pending());
            assert!(!store.euler_pending());
        }
    }

    #[test]
    fn quaternion_frame_leaves_euler_flag_alone() {
        let (decoder, store) = decoder();
        decoder.handle(&euler_payload(1, 2, 3));
        decoder.handle(&quaternion_payload(10000, 0, 0, 0));

        assert!(store.euler_pending());
        assert!(store.quaternion_pending());
        assert_eq!(store.last_euler(), EulerSample::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn euler_frame_maps_roll_pitch_yaw_to_xyz() {
        let (decoder, store) = decoder();
        for (roll, pitch, yaw) in [(10, 20, 30), (-180, 0, 179), (0, -90, -45)] {
            let event = decoder.handle(&euler_payload(roll, pitch, yaw));
            let expected = EulerSample::new(roll as f32, pitch as f32, yaw as f32);
            assert_eq!(event, Some(SensorEvent::Euler(expected)));
            assert_eq!(store.last_euler(), expected);
            assert!(store.euler_pending());
        }
    }

    #[test]
    fn off_unit_quaternion_is_stored_as_received() {
        let (decoder, store) = decoder();
        decoder.handle(&quaternion_payload(5000, 0, 0, 0));
        assert_eq!(
            store.last_quaternion(),
            QuaternionSample::new(0.5, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn unrecognized_payload_changes_nothing() {
        let (decoder, store) = decoder();
        assert_eq!(decoder.handle(&[0x01, 0x01, 0x00]), None);
        assert_eq!(decoder.handle(&[0x03, 0x01, 0x00]), None);
        assert_eq!(decoder.handle(&[]), None);

        assert!(!store.euler_pending());
        assert!(!store.quaternion_pending());
        assert_eq!(store.published_counts(), (0, 0));
    }

    #[test]
    fn euler_diagnostics_never_touch_dispatched_state() {
        let (decoder, store) = decoder();
        decoder.handle(&euler_payload(10, 20, 30));

        let diagnostics = store.diagnostics();
        let emulated = diagnostics.emulated_euler.unwrap();
        assert!((emulated.x - 10.0).abs() < EPSILON);
        assert!((emulated.y - 20.0).abs() < EPSILON);
        assert!((emulated.z - 30.0).abs() < EPSILON);
        assert!(diagnostics.emulated_quaternion.unwrap().w >= 0.0);

        assert_eq!(store.last_euler(), EulerSample::new(10.0, 20.0, 30.0));
        assert!(!store.quaternion_pending());
    }

    #[test]
    fn zero_quaternion_still_publishes() {
        let (decoder, store) = decoder();
        decoder.handle(&quaternion_payload(0, 0, 0, 0));
        assert!(store.quaternion_pending());
        assert!(store.diagnostics().emulated_euler.is_none());
    }

    #[test]
    fn disabled_diagnostics_skip_derived_copies() {
        let store = Arc::new(OrientationStore::new());
        let decoder = SensorDecoder::new(
            store.clone(),
            DiagnosticsSettings {
                enabled: false,
                axis_orders: AxisOrder::ALL.to_vec(),
            },
        );
        decoder.handle(&euler_payload(10, 20, 30));
        assert!(store.diagnostics().emulated_euler.is_none());
        assert!(store.euler_pending());
    }
}
