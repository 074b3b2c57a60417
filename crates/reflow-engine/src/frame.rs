//! One-frame deferred work.
//!
//! Two cleanups must not run in the same frame as the style writes that
//! precede them: restoring muted CSS transitions (or they would animate the
//! final snap) and restoring the scroll position captured at record time.
//! The engine queues them as explicit tasks; the host drains the queue on
//! its next frame via `LayoutAnimator::flush_frame_tasks`.

/// Work the host must perform one frame after the current batch of style
/// writes.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameTask {
    /// Restore the CSS transitions muted for measurement, unless a new cycle
    /// started in the meantime.
    RestoreTransitions,
    /// Restore the document scroll offset captured at record time.
    RestoreScroll { x: f64, y: f64 },
}

/// FIFO queue of deferred frame tasks.
#[derive(Debug, Default)]
pub struct FrameQueue {
    tasks: Vec<FrameTask>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: FrameTask) {
        self.tasks.push(task);
    }

    /// Take every queued task, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<FrameTask> {
        std::mem::take(&mut self.tasks)
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop queued tasks of one kind. Starting a new cycle discards any
    /// pending transition restore so the restore cannot race the new
    /// measurement pass.
    pub fn retain(&mut self, keep: impl Fn(&FrameTask) -> bool) {
        self.tasks.retain(|t| keep(t));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = FrameQueue::new();
        queue.push(FrameTask::RestoreTransitions);
        queue.push(FrameTask::RestoreScroll { x: 0.0, y: 120.0 });
        let tasks = queue.drain();
        assert_eq!(tasks.len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_retain_filters_kind() {
        let mut queue = FrameQueue::new();
        queue.push(FrameTask::RestoreTransitions);
        queue.push(FrameTask::RestoreScroll { x: 5.0, y: 0.0 });
        queue.retain(|t| !matches!(t, FrameTask::RestoreTransitions));
        assert_eq!(queue.drain(), vec![FrameTask::RestoreScroll { x: 5.0, y: 0.0 }]);
    }
}
