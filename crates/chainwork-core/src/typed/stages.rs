//! The three stage tasks of the pipeline.
//!
//! Each one receives the pipeline identifier under `"inId"`, spends
//! `work` on its unit of work and reports success.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::task::Task;
use crate::error::ChainError;

pub const INPUT_DATA_ID: &str = "inId";

async fn process(task: &str, id: &str, work: Duration) -> Result<(), ChainError> {
    debug!(task, id, ?work, "processing");
    tokio::time::sleep(work).await;
    info!(task, id, "finished");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct FirstTask {
    pub work: Duration,
}

#[async_trait]
impl Task for FirstTask {
    const NAME: &'static str = "first";
    const INPUT_KEY: &'static str = INPUT_DATA_ID;

    async fn run(&self, id: &str) -> Result<(), ChainError> {
        process(Self::NAME, id, self.work).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SecondTask {
    pub work: Duration,
}

#[async_trait]
impl Task for SecondTask {
    const NAME: &'static str = "second";
    const INPUT_KEY: &'static str = INPUT_DATA_ID;

    async fn run(&self, id: &str) -> Result<(), ChainError> {
        process(Self::NAME, id, self.work).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThirdTask {
    pub work: Duration,
}

#[async_trait]
impl Task for ThirdTask {
    const NAME: &'static str = "third";
    const INPUT_KEY: &'static str = INPUT_DATA_ID;

    async fn run(&self, id: &str) -> Result<(), ChainError> {
        process(Self::NAME, id, self.work).await
    }
}
