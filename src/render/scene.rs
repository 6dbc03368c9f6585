//! Scene node contract and a headless implementation.
//!
//! Axes follow the Z-up convention: heading turns about Z (vertical), pitch
//! about X (lateral), roll about Y (longitudinal). Positive angles are
//! right-handed rotations about the axis.

use glam::Quat;
use std::path::PathBuf;
use tracing::debug;

/// What the orientation consumer needs from a rendered object.
pub trait SceneNode: Send {
    /// Absolute orientation, taken as given.
    fn set_quat(&mut self, rotation: Quat);

    fn quat(&self) -> Quat;

    /// Absolute heading/pitch/roll in degrees. `(0, 0, 0)` is identity.
    fn set_hpr(&mut self, heading: f32, pitch: f32, roll: f32);

    /// Rotates about the node's own Z axis.
    fn rotate_heading(&mut self, degrees: f32);

    /// Rotates about the node's own Y axis.
    fn rotate_roll(&mut self, degrees: f32);

    /// Rotates about the node's own X axis.
    fn rotate_pitch(&mut self, degrees: f32);
}

/// Scene node that only tracks its transform.
#[derive(Clone, Debug)]
pub struct TransformNode {
    name: String,
    model: PathBuf,
    scale: f32,
    rotation: Quat,
}

impl TransformNode {
    pub fn new(name: impl Into<String>, model: PathBuf, scale: f32) -> Self {
        let name = name.into();
        debug!(
            "Creating scene node {} (model: {}, scale: {})",
            name,
            model.display(),
            scale
        );
        Self {
            name,
            model,
            scale,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &PathBuf {
        &self.model
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

impl SceneNode for TransformNode {
    fn set_quat(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn quat(&self) -> Quat {
        self.rotation
    }

    fn set_hpr(&mut self, heading: f32, pitch: f32, roll: f32) {
        self.rotation = Quat::from_rotation_z(heading.to_radians())
            * Quat::from_rotation_x(pitch.to_radians())
            * Quat::from_rotation_y(roll.to_radians());
    }

    fn rotate_heading(&mut self, degrees: f32) {
        self.rotation *= Quat::from_rotation_z(degrees.to_radians());
    }

    fn rotate_roll(&mut self, degrees: f32) {
        self.rotation *= Quat::from_rotation_y(degrees.to_radians());
    }

    fn rotate_pitch(&mut self, degrees: f32) {
        self.rotation *= Quat::from_rotation_x(degrees.to_radians());
    }
}
