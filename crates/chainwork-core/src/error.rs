use std::time::Duration;

use thiserror::Error;

use crate::domain::{PipelineId, TaskId, TaskName};
use crate::scheduler::TaskStatus;

#[derive(Debug, Error)]
pub enum ChainError {
    /// A caller broke an API contract (missing channel id, wrong input key).
    /// Not retryable.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("cannot enqueue an empty chain")]
    EmptyChain,

    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    #[error("unknown pipeline: {0}")]
    UnknownPipeline(PipelineId),

    #[error("invalid transition for {task}: {from:?} -> {to:?}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("task '{task}' failed: {reason}")]
    TaskFailed { task: TaskName, reason: String },

    #[error("notifier '{0}' is already active")]
    AlreadyActive(String),

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: String },

    #[error("{0} closed")]
    Closed(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChainError>;
