use serde::{Deserialize, Serialize};

use crate::scheduler::TaskStatus;

/// Number of tasks per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub enqueued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Enqueued => self.enqueued += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Succeeded => self.succeeded += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.enqueued + self.running + self.succeeded + self.failed + self.cancelled
    }

    /// No task is Enqueued or Running.
    pub fn is_settled(&self) -> bool {
        self.enqueued == 0 && self.running == 0
    }
}
