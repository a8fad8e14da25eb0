//! Task status state machine.

use serde::{Deserialize, Serialize};

/// Status of one task in a chain.
///
/// State transitions:
/// - Enqueued -> Running -> Succeeded
/// - Enqueued -> Running -> Failed
/// - Enqueued -> Cancelled (upstream failed, or the pipeline was cancelled)
///
/// No task re-enters Running after a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Admitted to the scheduler, waiting for its predecessor and its gate.
    Enqueued,

    /// Currently being executed by a worker.
    Running,

    /// Completed successfully.
    Succeeded,

    /// The unit of work reported failure.
    Failed,

    /// Never ran and never will.
    Cancelled,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn is_success(self) -> bool {
        self == TaskStatus::Succeeded
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Enqueued, Running) | (Enqueued, Cancelled) | (Running, Succeeded) | (Running, Failed)
        )
    }
}
