//! Binary payloads exchanged with the cube
//!
//! All multi-byte fields are little-endian. Sensor and button notifications
//! are decoded into typed frames; configuration and indicator requests are
//! encoded from typed parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const SENSOR_POSTURE: u8 = 0x03;
pub const POSTURE_EULER: u8 = 0x01;
pub const POSTURE_QUATERNION: u8 = 0x02;

pub const BUTTON_FUNCTION: u8 = 0x01;
pub const BUTTON_PRESSED: u8 = 0x80;
pub const BUTTON_RELEASED: u8 = 0x00;

pub const CONFIG_POSTURE_DETECTION: u8 = 0x1d;

pub const INDICATOR_TURN_ON: u8 = 0x03;
pub const INDICATOR_TURN_OFF_ALL: u8 = 0x01;

/// Wire unit for intervals and durations.
pub const TIME_UNIT_MS: u64 = 10;

const EULER_FRAME_LEN: usize = 8;
const QUATERNION_FRAME_LEN: usize = 10;

// Euler posture notification, degrees
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EulerFrame {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

// Quaternion posture notification, fixed point (1.0 == 10000)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuaternionFrame {
    pub w: i16,
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorFrame {
    Euler(EulerFrame),
    Quaternion(QuaternionFrame),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonFrame {
    Pressed,
    Released,
}

/// Posture representation the cube streams.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    #[default]
    Euler,
    Quaternion,
}

impl DetectionMode {
    pub fn other(self) -> Self {
        match self {
            DetectionMode::Euler => DetectionMode::Quaternion,
            DetectionMode::Quaternion => DetectionMode::Euler,
        }
    }

    fn code(self) -> u8 {
        match self {
            DetectionMode::Euler => POSTURE_EULER,
            DetectionMode::Quaternion => POSTURE_QUATERNION,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            POSTURE_EULER => Some(DetectionMode::Euler),
            POSTURE_QUATERNION => Some(DetectionMode::Quaternion),
            _ => None,
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Euler => write!(f, "Euler"),
            DetectionMode::Quaternion => write!(f, "Quaternion"),
        }
    }
}

/// When the cube sends posture notifications.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionCondition {
    Always,
    #[default]
    ChangeDetection,
}

impl DetectionCondition {
    fn code(self) -> u8 {
        match self {
            DetectionCondition::Always => 0x00,
            DetectionCondition::ChangeDetection => 0x01,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(DetectionCondition::Always),
            0x01 => Some(DetectionCondition::ChangeDetection),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndicatorParam {
    /// 0 keeps the light on until turned off
    pub duration_ms: u64,
    pub color: Color,
}

/// Decoded configuration write, used by the simulated cube.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectionRequest {
    pub mode: DetectionMode,
    pub interval_ms: u64,
    pub condition: DetectionCondition,
}

fn read_i16(payload: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([payload[offset], payload[offset + 1]])
}

fn to_time_units(ms: u64) -> u8 {
    (ms / TIME_UNIT_MS).min(u8::MAX as u64) as u8
}

impl SensorFrame {
    /// Classifies a sensor notification. Anything that is not a posture
    /// frame of a known type and length returns `None`.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 2 || payload[0] != SENSOR_POSTURE {
            return None;
        }
        match payload[1] {
            POSTURE_EULER if payload.len() >= EULER_FRAME_LEN => {
                Some(SensorFrame::Euler(EulerFrame {
                    roll: read_i16(payload, 2),
                    pitch: read_i16(payload, 4),
                    yaw: read_i16(payload, 6),
                }))
            }
            POSTURE_QUATERNION if payload.len() >= QUATERNION_FRAME_LEN => {
                Some(SensorFrame::Quaternion(QuaternionFrame {
                    w: read_i16(payload, 2),
                    x: read_i16(payload, 4),
                    y: read_i16(payload, 6),
                    z: read_i16(payload, 8),
                }))
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            SensorFrame::Euler(frame) => {
                let mut out = vec![SENSOR_POSTURE, POSTURE_EULER];
                out.extend_from_slice(&frame.roll.to_le_bytes());
                out.extend_from_slice(&frame.pitch.to_le_bytes());
                out.extend_from_slice(&frame.yaw.to_le_bytes());
                out
            }
            SensorFrame::Quaternion(frame) => {
                let mut out = vec![SENSOR_POSTURE, POSTURE_QUATERNION];
                out.extend_from_slice(&frame.w.to_le_bytes());
                out.extend_from_slice(&frame.x.to_le_bytes());
                out.extend_from_slice(&frame.y.to_le_bytes());
                out.extend_from_slice(&frame.z.to_le_bytes());
                out
            }
        }
    }
}

impl ButtonFrame {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            [BUTTON_FUNCTION, BUTTON_PRESSED, ..] => Some(ButtonFrame::Pressed),
            [BUTTON_FUNCTION, BUTTON_RELEASED, ..] => Some(ButtonFrame::Released),
            _ => None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ButtonFrame::Pressed => vec![BUTTON_FUNCTION, BUTTON_PRESSED],
            ButtonFrame::Released => vec![BUTTON_FUNCTION, BUTTON_RELEASED],
        }
    }
}

pub fn encode_detection_mode(
    mode: DetectionMode,
    interval_ms: u64,
    condition: DetectionCondition,
) -> Vec<u8> {
    vec![
        CONFIG_POSTURE_DETECTION,
        0x00,
        mode.code(),
        to_time_units(interval_ms),
        condition.code(),
    ]
}

pub fn decode_detection_mode(payload: &[u8]) -> Option<DetectionRequest> {
    match payload {
        [CONFIG_POSTURE_DETECTION, 0x00, mode, interval, condition, ..] => {
            Some(DetectionRequest {
                mode: DetectionMode::from_code(*mode)?,
                interval_ms: *interval as u64 * TIME_UNIT_MS,
                condition: DetectionCondition::from_code(*condition)?,
            })
        }
        _ => None,
    }
}

pub fn encode_indicator_on(param: &IndicatorParam) -> Vec<u8> {
    vec![
        INDICATOR_TURN_ON,
        to_time_units(param.duration_ms),
        0x01,
        0x01,
        param.color.r,
        param.color.g,
        param.color.b,
    ]
}

pub fn encode_indicator_off_all() -> Vec<u8> {
    vec![INDICATOR_TURN_OFF_ALL]
}
