//! Orientation Consumer - per-frame application of pending posture updates
//!
//! Each frame resolves at most one pending update:
//!
//! 1. A pending quaternion is set as the node's absolute orientation.
//! 2. Otherwise a pending Euler sample resets the node to identity and applies
//!    heading (`z`), roll (`y`) and pitch (`x`) in that order, each about the
//!    node's own, already rotated axes.
//! 3. Otherwise the node keeps its orientation.
//!
//! When both kinds are pending the quaternion wins and the Euler sample stays
//! pending for a later frame.

use std::sync::Arc;
use tracing::debug;

use super::scene::SceneNode;
use super::scheduler::{FrameTask, TaskStatus};
use crate::state::{EulerSample, OrientationStore, QuaternionSample};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Applied {
    Quaternion(QuaternionSample),
    Euler(EulerSample),
}

pub struct OrientationConsumer<N: SceneNode> {
    store: Arc<OrientationStore>,
    node: N,
    quaternions_applied: u64,
    eulers_applied: u64,
}

impl<N: SceneNode> OrientationConsumer<N> {
    pub fn new(store: Arc<OrientationStore>, node: N) -> Self {
        Self {
            store,
            node,
            quaternions_applied: 0,
            eulers_applied: 0,
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    /// Applications so far as (quaternion, euler).
    pub fn applied_counts(&self) -> (u64, u64) {
        (self.quaternions_applied, self.eulers_applied)
    }

    /// Resolves at most one pending update onto the node.
    pub fn consume(&mut self) -> Option<Applied> {
        if let Some(sample) = self.store.take_quaternion() {
            self.node.set_quat(sample.to_quat());
            self.quaternions_applied += 1;
            debug!("Applied quaternion {:?}", sample);
            return Some(Applied::Quaternion(sample));
        }

        if let Some(sample) = self.store.take_euler() {
            self.node.set_hpr(0.0, 0.0, 0.0);
            self.node.rotate_heading(sample.z);
            self.node.rotate_roll(sample.y);
            self.node.rotate_pitch(sample.x);
            self.eulers_applied += 1;
            debug!("Applied Euler {:?}", sample);
            return Some(Applied::Euler(sample));
        }

        None
    }
}

impl<N: SceneNode> FrameTask for OrientationConsumer<N> {
    fn name(&self) -> &str {
        "cube update"
    }

    fn run_frame(&mut self, _frame: u64) -> TaskStatus {
        self.consume();
        TaskStatus::Continue
    }
}
