//! Task record: metadata + handler + status broadcast.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use super::TaskStatus;
use crate::domain::{PipelineId, TaskId, TaskInput, TaskName};
use crate::ports::ConditionGate;
use crate::typed::TaskHandler;

/// Transitions per task never exceed three, so this never lags.
const STATUS_CHANNEL_CAPACITY: usize = 8;

/// Single source of truth for one task's state.
///
/// - The scheduler's ready order and dependency graph hold `TaskId`s only.
/// - Every status change goes through `set_status`.
pub struct TaskRecord {
    pub task_id: TaskId,
    pub pipeline_id: PipelineId,
    pub name: TaskName,
    pub input: TaskInput,
    pub handler: Arc<dyn TaskHandler>,
    pub gate: Arc<dyn ConditionGate>,

    pub status: TaskStatus,

    /// Failure reason, or why the task was cancelled.
    pub last_error: Option<String>,

    events: broadcast::Sender<TaskStatus>,
}

impl TaskRecord {
    pub fn new(
        task_id: TaskId,
        pipeline_id: PipelineId,
        handler: Arc<dyn TaskHandler>,
        input: TaskInput,
        gate: Arc<dyn ConditionGate>,
    ) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            task_id,
            pipeline_id,
            name: handler.name(),
            input,
            handler,
            gate,
            status: TaskStatus::Enqueued,
            last_error: None,
            events,
        }
    }

    /// Apply `next` and push it to every live subscriber.
    ///
    /// The caller has already checked `can_transition_to`.
    pub fn set_status(&mut self, next: TaskStatus, reason: Option<String>) {
        self.status = next;
        if reason.is_some() {
            self.last_error = reason;
        }
        // no subscribers is fine
        let _ = self.events.send(next);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskStatus> {
        self.events.subscribe()
    }
}

/// One entry of the scheduler's transition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    /// Scheduler-wide sequence number, strictly increasing.
    pub seq: u64,
    pub task_id: TaskId,
    pub task: TaskName,
    /// `None` for the creation entry.
    pub from: Option<TaskStatus>,
    pub to: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub pipeline_id: PipelineId,
    pub name: TaskName,
    pub status: TaskStatus,
    pub last_error: Option<String>,
}

impl From<&TaskRecord> for TaskSnapshot {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.task_id,
            pipeline_id: record.pipeline_id,
            name: record.name.clone(),
            status: record.status,
            last_error: record.last_error.clone(),
        }
    }
}
