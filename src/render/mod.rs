//! Render-side consumption of the orientation store
//!
//! 1. [`scene`] - the [`SceneNode`] contract and the headless [`TransformNode`]
//! 2. [`consumer`] - [`OrientationConsumer`], the per-frame dirty-flag consumer
//! 3. [`scheduler`] - [`FrameScheduler`] running [`FrameTask`] hooks once per frame
//!
//! ```text
//! OrientationStore ──take──► OrientationConsumer ──set_quat / hpr──► SceneNode
//!                                   ▲
//!                            FrameScheduler::step (once per frame)
//! ```

pub mod consumer;
pub mod scene;
pub mod scheduler;

pub use consumer::{Applied, OrientationConsumer};
pub use scene::{SceneNode, TransformNode};
pub use scheduler::{FrameScheduler, FrameTask, TaskStatus};
