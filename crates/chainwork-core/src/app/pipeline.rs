//! PipelineRun - 実行中のパイプラインと最終サマリ

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::observer::{ObserverHandle, StageReport};
use crate::domain::PipelineId;
use crate::error::Result;
use crate::observability::StatusCounts;
use crate::scheduler::{PipelineHandle, PipelineScheduler, PipelineState, TransitionRecord, WorkerGroup};

/// A started pipeline: its chain, its workers and its stage watchers.
pub struct PipelineRun {
    identifier: String,
    handle: PipelineHandle,
    scheduler: Arc<PipelineScheduler>,
    workers: WorkerGroup,
    observer: ObserverHandle,
}

impl PipelineRun {
    pub(crate) fn new(
        identifier: String,
        handle: PipelineHandle,
        scheduler: Arc<PipelineScheduler>,
        workers: WorkerGroup,
        observer: ObserverHandle,
    ) -> Self {
        Self {
            identifier,
            handle,
            scheduler,
            workers,
            observer,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn handle(&self) -> &PipelineHandle {
        &self.handle
    }

    pub async fn state(&self) -> Result<PipelineState> {
        self.scheduler.pipeline_state(self.handle.id()).await
    }

    /// Cancel the stages that have not started yet.
    pub async fn cancel(&self) -> Result<usize> {
        self.scheduler.cancel_pipeline(self.handle.id()).await
    }

    /// Wait until every stage is settled (including its notifier), then stop
    /// the workers and summarize.
    pub async fn finish(self) -> Result<RunSummary> {
        let stages = self.observer.join().await;
        self.workers.shutdown_and_join().await;
        let stages = stages?;

        let pipeline_id = self.handle.id();
        let ids: HashSet<_> = self.handle.tasks().iter().map(|t| t.id).collect();
        let transitions: Vec<TransitionRecord> = self
            .scheduler
            .transitions()
            .await
            .into_iter()
            .filter(|t| ids.contains(&t.task_id))
            .collect();

        let mut counts = StatusCounts::default();
        for task in self.handle.tasks() {
            counts.record(self.scheduler.status(task.id).await?);
        }
        let state = self.scheduler.pipeline_state(pipeline_id).await?;

        if !counts.is_settled() {
            warn!(pipeline = %pipeline_id, ?counts, "finished with unsettled tasks");
        }
        info!(pipeline = %pipeline_id, ?state, tasks = counts.total(), "pipeline finished");
        Ok(RunSummary {
            pipeline_id,
            identifier: self.identifier,
            state,
            stages,
            transitions,
            counts,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pipeline_id: PipelineId,
    pub identifier: String,
    pub state: PipelineState,
    pub stages: Vec<StageReport>,
    pub transitions: Vec<TransitionRecord>,
    pub counts: StatusCounts,
}

impl RunSummary {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
