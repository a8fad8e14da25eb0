mod chain;
mod dependency;
mod record;
mod state;
mod worker;

pub use chain::{
    ChainLink, Lease, PipelineHandle, PipelineScheduler, PipelineState, StatusStream, TaskRef,
};
pub use dependency::DependencyGraph;
pub use record::{TaskRecord, TaskSnapshot, TransitionRecord};
pub use state::TaskStatus;
pub use worker::WorkerGroup;
