//! Domain model (IDs, task names and inputs, channel identifiers).

pub mod channel;
pub mod ids;
pub mod task;

pub use channel::ChannelId;
pub use ids::{PipelineId, TaskId};
pub use task::{TaskInput, TaskName};
