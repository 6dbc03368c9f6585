use tracing::{debug, info};

/// Returned by a frame task to stay scheduled or drop out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Continue,
    Done,
}

/// Per-frame hook.
pub trait FrameTask: Send {
    fn name(&self) -> &str;

    fn run_frame(&mut self, frame: u64) -> TaskStatus;
}

/// Runs every registered task once per [`FrameScheduler::step`], in
/// registration order.
#[derive(Default)]
pub struct FrameScheduler {
    tasks: Vec<Box<dyn FrameTask>>,
    frame: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Box<dyn FrameTask>) {
        info!("Scheduling frame task '{}'", task.name());
        self.tasks.push(task);
    }

    /// Runs one frame. Returns the number of tasks still scheduled.
    pub fn step(&mut self) -> usize {
        let frame = self.frame;
        self.tasks.retain_mut(|task| match task.run_frame(frame) {
            TaskStatus::Continue => true,
            TaskStatus::Done => {
                debug!("Frame task '{}' finished at frame {}", task.name(), frame);
                false
            }
        });
        self.frame += 1;
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}
