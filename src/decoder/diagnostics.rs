//! Euler/quaternion conversions used only for logging.
//!
//! Lower-case orders are extrinsic (rotations about the fixed world axes),
//! upper-case orders are intrinsic (rotations about the rotated body axes).
//! Nothing computed here is ever dispatched to the renderer.

use glam::{EulerRot, Quat};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{EulerSample, QuaternionSample};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisOrder {
    #[serde(rename = "xyz")]
    Xyz,
    #[serde(rename = "xzy")]
    Xzy,
    #[serde(rename = "yxz")]
    Yxz,
    #[serde(rename = "yzx")]
    Yzx,
    #[serde(rename = "zxy")]
    Zxy,
    #[serde(rename = "zyx")]
    Zyx,
    #[serde(rename = "XYZ")]
    IntrinsicXyz,
    #[serde(rename = "XZY")]
    IntrinsicXzy,
    #[serde(rename = "YXZ")]
    IntrinsicYxz,
    #[serde(rename = "YZX")]
    IntrinsicYzx,
    #[serde(rename = "ZXY")]
    IntrinsicZxy,
    #[serde(rename = "ZYX")]
    IntrinsicZyx,
}

impl AxisOrder {
    pub const ALL: [AxisOrder; 12] = [
        AxisOrder::Xyz,
        AxisOrder::Xzy,
        AxisOrder::Yxz,
        AxisOrder::Yzx,
        AxisOrder::Zxy,
        AxisOrder::Zyx,
        AxisOrder::IntrinsicXyz,
        AxisOrder::IntrinsicXzy,
        AxisOrder::IntrinsicYxz,
        AxisOrder::IntrinsicYzx,
        AxisOrder::IntrinsicZxy,
        AxisOrder::IntrinsicZyx,
    ];

    pub fn is_extrinsic(self) -> bool {
        matches!(
            self,
            AxisOrder::Xyz
                | AxisOrder::Xzy
                | AxisOrder::Yxz
                | AxisOrder::Yzx
                | AxisOrder::Zxy
                | AxisOrder::Zyx
        )
    }

    fn sequence(self) -> [Axis; 3] {
        use Axis::{X, Y, Z};
        match self {
            AxisOrder::Xyz | AxisOrder::IntrinsicXyz => [X, Y, Z],
            AxisOrder::Xzy | AxisOrder::IntrinsicXzy => [X, Z, Y],
            AxisOrder::Yxz | AxisOrder::IntrinsicYxz => [Y, X, Z],
            AxisOrder::Yzx | AxisOrder::IntrinsicYzx => [Y, Z, X],
            AxisOrder::Zxy | AxisOrder::IntrinsicZxy => [Z, X, Y],
            AxisOrder::Zyx | AxisOrder::IntrinsicZyx => [Z, Y, X],
        }
    }

    /// Intrinsic glam rotation with the same effect, and whether the angle
    /// sequence has to be reversed to use it. An extrinsic a-b-c rotation is
    /// the intrinsic C-B-A rotation with the angles in reverse.
    fn glam_rotation(self) -> (EulerRot, bool) {
        let mut seq = self.sequence();
        let reversed = self.is_extrinsic();
        if reversed {
            seq.reverse();
        }
        use Axis::{X, Y, Z};
        let rot = match seq {
            [X, Y, Z] => EulerRot::XYZ,
            [X, Z, Y] => EulerRot::XZY,
            [Y, X, Z] => EulerRot::YXZ,
            [Y, Z, X] => EulerRot::YZX,
            [Z, X, Y] => EulerRot::ZXY,
            _ => EulerRot::ZYX,
        };
        (rot, reversed)
    }

    /// Rotation for angles given as (x, y, z) degrees.
    pub fn to_quat(self, angles: EulerSample) -> Quat {
        let degrees = angles.to_array();
        let mut ordered = self.sequence().map(|axis| degrees[axis as usize].to_radians());
        let (rot, reversed) = self.glam_rotation();
        if reversed {
            ordered.reverse();
        }
        Quat::from_euler(rot, ordered[0], ordered[1], ordered[2])
    }

    /// Decomposes a unit quaternion into (x, y, z) degrees.
    pub fn decompose(self, q: Quat) -> EulerSample {
        let (rot, reversed) = self.glam_rotation();
        let (a, b, c) = q.to_euler(rot);
        let mut ordered = [a, b, c];
        if reversed {
            ordered.reverse();
        }
        let mut out = [0.0f32; 3];
        for (axis, angle) in self.sequence().iter().zip(ordered) {
            out[*axis as usize] = angle.to_degrees();
        }
        EulerSample::new(out[0], out[1], out[2])
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AxisOrder::Xyz => "xyz",
            AxisOrder::Xzy => "xzy",
            AxisOrder::Yxz => "yxz",
            AxisOrder::Yzx => "yzx",
            AxisOrder::Zxy => "zxy",
            AxisOrder::Zyx => "zyx",
            AxisOrder::IntrinsicXyz => "XYZ",
            AxisOrder::IntrinsicXzy => "XZY",
            AxisOrder::IntrinsicYxz => "YXZ",
            AxisOrder::IntrinsicYzx => "YZX",
            AxisOrder::IntrinsicZxy => "ZXY",
            AxisOrder::IntrinsicZyx => "ZYX",
        };
        write!(f, "{}", name)
    }
}

// Diagnostics settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsSettings {
    pub enabled: bool,
    pub axis_orders: Vec<AxisOrder>,
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            axis_orders: vec![AxisOrder::Xyz],
        }
    }
}

/// Flips the sign so that `w >= 0`; both signs describe the same rotation.
pub fn canonical(q: Quat) -> Quat {
    if q.w < 0.0 {
        -q
    } else {
        q
    }
}

/// Result of the Euler -> quaternion -> Euler round trip.
#[derive(Clone, Copy, Debug)]
pub struct RoundTrip {
    pub quaternion: QuaternionSample,
    pub euler: EulerSample,
}

pub fn euler_round_trip(order: AxisOrder, sample: EulerSample) -> RoundTrip {
    let q = canonical(order.to_quat(sample));
    RoundTrip {
        quaternion: QuaternionSample::new(q.w, q.x, q.y, q.z),
        euler: order.decompose(q),
    }
}

/// Decomposes a raw sample under `order`. Returns `None` for a zero-length
/// quaternion, which has no orientation.
pub fn decompose_sample(order: AxisOrder, sample: QuaternionSample) -> Option<EulerSample> {
    let q = sample.to_quat();
    if q.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(order.decompose(q.normalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat3;

    const EPSILON: f32 = 1e-2;

    fn assert_euler(actual: EulerSample, expected: EulerSample) {
        for (lhs, rhs) in actual.to_array().into_iter().zip(expected.to_array()) {
            assert!((lhs - rhs).abs() <= EPSILON, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn extrinsic_xyz_matches_fixed_axis_composition() {
        let angles = EulerSample::new(10.0, 20.0, 30.0);
        let expected = Mat3::from_rotation_z(30f32.to_radians())
            * Mat3::from_rotation_y(20f32.to_radians())
            * Mat3::from_rotation_x(10f32.to_radians());
        let actual = Mat3::from_quat(AxisOrder::Xyz.to_quat(angles));
        assert!(actual.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn intrinsic_xyz_matches_body_axis_composition() {
        let angles = EulerSample::new(10.0, 20.0, 30.0);
        let expected = Mat3::from_rotation_x(10f32.to_radians())
            * Mat3::from_rotation_y(20f32.to_radians())
            * Mat3::from_rotation_z(30f32.to_radians());
        let actual = Mat3::from_quat(AxisOrder::IntrinsicXyz.to_quat(angles));
        assert!(actual.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn every_order_round_trips_moderate_angles() {
        let angles = EulerSample::new(12.0, -25.0, 40.0);
        for order in AxisOrder::ALL {
            let q = order.to_quat(angles);
            assert_euler(order.decompose(q), angles);
        }
    }

    #[test]
    fn round_trip_canonicalizes_quaternion() {
        let trip = euler_round_trip(AxisOrder::Xyz, EulerSample::new(0.0, 0.0, 270.0));
        assert!(trip.quaternion.w >= 0.0);
        assert_euler(trip.euler, EulerSample::new(0.0, 0.0, -90.0));
    }

    #[test]
    fn zero_quaternion_has_no_decomposition() {
        let zero = QuaternionSample::new(0.0, 0.0, 0.0, 0.0);
        assert!(decompose_sample(AxisOrder::Xyz, zero).is_none());
    }

    #[test]
    fn decomposition_ignores_scale() {
        let half = QuaternionSample::new(0.5, 0.0, 0.0, 0.0);
        assert_euler(
            decompose_sample(AxisOrder::Xyz, half).unwrap(),
            EulerSample::new(0.0, 0.0, 0.0),
        );
    }

    #[test]
    fn axis_orders_parse_from_config_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            orders: Vec<AxisOrder>,
        }
        let parsed: Wrapper = toml::from_str(r#"orders = ["xyz", "ZYX", "yzx"]"#).unwrap();
        assert_eq!(
            parsed.orders,
            vec![AxisOrder::Xyz, AxisOrder::IntrinsicZyx, AxisOrder::Yzx]
        );
    }
}
