//! Chain scheduler: strict in-order admission gated on preconditions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use super::{DependencyGraph, TaskRecord, TaskSnapshot, TaskStatus, TransitionRecord};
use crate::config::SchedulerConfig;
use crate::domain::{PipelineId, TaskId, TaskInput, TaskName};
use crate::error::{ChainError, Result};
use crate::observability::StatusCounts;
use crate::ports::ConditionGate;
use crate::typed::TaskHandler;

/// One element of a chain: what to run, with which input, under which gate.
pub struct ChainLink {
    pub handler: Arc<dyn TaskHandler>,
    pub input: TaskInput,
    pub gate: Arc<dyn ConditionGate>,
}

impl ChainLink {
    pub fn new(
        handler: Arc<dyn TaskHandler>,
        input: TaskInput,
        gate: Arc<dyn ConditionGate>,
    ) -> Self {
        Self {
            handler,
            input,
            gate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRef {
    pub id: TaskId,
    pub name: TaskName,
}

/// Ordered task references of one enqueued chain.
///
/// The edges (each task waits for the one before it) live in the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineHandle {
    id: PipelineId,
    tasks: Vec<TaskRef>,
}

impl PipelineHandle {
    pub fn id(&self) -> PipelineId {
        self.id
    }

    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> Option<&TaskRef> {
        self.tasks.get(index)
    }
}

/// Pipeline state aggregated from its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    /// At least one task is Enqueued or Running.
    Running,

    /// Every task Succeeded.
    Completed,

    /// All tasks are terminal and at least one Failed.
    Failed,

    /// All tasks are terminal, none Failed, at least one Cancelled.
    Cancelled,
}

impl PipelineState {
    pub fn from_statuses(statuses: &[TaskStatus]) -> Self {
        if statuses.iter().any(|s| !s.is_terminal()) {
            PipelineState::Running
        } else if statuses.iter().all(|s| s.is_success()) {
            PipelineState::Completed
        } else if statuses.contains(&TaskStatus::Failed) {
            PipelineState::Failed
        } else {
            PipelineState::Cancelled
        }
    }
}

enum Admission {
    Ready(TaskId),
    /// Something is unblocked but its gate is closed.
    Gated,
    Idle,
}

struct SchedulerState {
    /// All task records (single source of truth).
    records: HashMap<TaskId, TaskRecord>,

    /// Non-terminal tasks in enqueue order.
    order: Vec<TaskId>,

    pipelines: HashMap<PipelineId, Vec<TaskId>>,

    graph: DependencyGraph,

    /// Tasks already reported as waiting on their gate.
    gated: HashSet<TaskId>,

    transitions: Vec<TransitionRecord>,
    next_seq: u64,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            pipelines: HashMap::new(),
            graph: DependencyGraph::new(),
            gated: HashSet::new(),
            transitions: Vec::new(),
            next_seq: 1,
        }
    }

    fn log(
        &mut self,
        task_id: TaskId,
        task: TaskName,
        from: Option<TaskStatus>,
        to: TaskStatus,
        reason: Option<String>,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.transitions.push(TransitionRecord {
            seq,
            task_id,
            task,
            from,
            to,
            reason,
            at: Utc::now(),
        });
    }

    fn insert(&mut self, record: TaskRecord) {
        let task_id = record.task_id;
        let name = record.name.clone();
        self.records.insert(task_id, record);
        self.order.push(task_id);
        self.log(task_id, name, None, TaskStatus::Enqueued, None);
    }

    /// The only place where a record's status changes.
    fn transition(
        &mut self,
        task_id: TaskId,
        to: TaskStatus,
        reason: Option<String>,
    ) -> Result<TaskStatus> {
        let (from, name) = {
            let record = self
                .records
                .get_mut(&task_id)
                .ok_or(ChainError::UnknownTask(task_id))?;
            let from = record.status;
            if !from.can_transition_to(to) {
                return Err(ChainError::InvalidTransition {
                    task: task_id,
                    from,
                    to,
                });
            }
            record.set_status(to, reason.clone());
            (from, record.name.clone())
        };

        debug!(task = %name, %task_id, ?from, ?to, "transition");
        if to.is_terminal() {
            self.order.retain(|id| *id != task_id);
            self.gated.remove(&task_id);
        }
        self.log(task_id, name, Some(from), to, reason);
        Ok(from)
    }

    /// First Enqueued task (in enqueue order) with no pending dependency and
    /// an open gate.
    fn next_admission(&mut self) -> Admission {
        let mut gated = false;
        for &task_id in &self.order {
            let Some(record) = self.records.get(&task_id) else {
                continue;
            };
            if record.status != TaskStatus::Enqueued || self.graph.has_dependencies(task_id) {
                continue;
            }
            if record.gate.is_satisfied() {
                return Admission::Ready(task_id);
            }
            if self.gated.insert(task_id) {
                debug!(task = %record.name, %task_id, gate = record.gate.name(), "waiting for gate");
            }
            gated = true;
        }
        if gated { Admission::Gated } else { Admission::Idle }
    }

    /// Cancel every still-Enqueued task behind `task_id` and cut it out of
    /// the graph.
    fn cancel_downstream(&mut self, task_id: TaskId, reason: &str) -> Vec<TaskId> {
        let downstream = self.graph.downstream_of(task_id);
        let mut cancelled = Vec::new();
        for &next in &downstream {
            let enqueued = self
                .records
                .get(&next)
                .is_some_and(|r| r.status == TaskStatus::Enqueued);
            if enqueued && self.transition(next, TaskStatus::Cancelled, Some(reason.to_string())).is_ok() {
                cancelled.push(next);
            }
        }
        self.graph.remove_task(task_id);
        for next in downstream {
            self.graph.remove_task(next);
        }
        cancelled
    }

    fn counts_by_state(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.records.values() {
            counts.record(record.status);
        }
        counts
    }
}

/// Admits tasks of each chain strictly in order.
///
/// The scheduler only sequences and gates; the work itself is done by
/// whoever holds the `Lease` (see `WorkerGroup`).
pub struct PipelineScheduler {
    state: Arc<Mutex<SchedulerState>>,
    notify: Arc<Notify>,
    gate_poll_interval: Duration,
}

impl PipelineScheduler {
    pub fn new(gate_poll_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new())),
            notify: Arc::new(Notify::new()),
            gate_poll_interval,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.gate_poll_interval())
    }

    /// Enqueue `links` as one chain: each task waits for the one before it.
    pub async fn enqueue_chain(&self, links: Vec<ChainLink>) -> Result<PipelineHandle> {
        if links.is_empty() {
            return Err(ChainError::EmptyChain);
        }

        let pipeline_id = PipelineId::generate();
        let handle = {
            let mut state = self.state.lock().await;
            let mut tasks = Vec::with_capacity(links.len());
            let mut previous: Option<TaskId> = None;
            for link in links {
                let task_id = TaskId::generate();
                let record =
                    TaskRecord::new(task_id, pipeline_id, link.handler, link.input, link.gate);
                tasks.push(TaskRef {
                    id: task_id,
                    name: record.name.clone(),
                });
                state.insert(record);
                if let Some(prev) = previous {
                    state.graph.add_dependency(task_id, prev);
                }
                previous = Some(task_id);
            }
            state
                .pipelines
                .insert(pipeline_id, tasks.iter().map(|t| t.id).collect());
            PipelineHandle {
                id: pipeline_id,
                tasks,
            }
        };

        info!(
            pipeline = %pipeline_id,
            tasks = ?handle.tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "enqueued chain"
        );
        wake_workers(&self.notify);
        Ok(handle)
    }

    /// Wait for the next admissible task and mark it Running.
    pub async fn lease(&self) -> Lease {
        loop {
            let admission = {
                let mut state = self.state.lock().await;
                match state.next_admission() {
                    Admission::Ready(task_id) => {
                        // next_admission only returns Enqueued tasks
                        if state.transition(task_id, TaskStatus::Running, None).is_ok()
                            && let Some(record) = state.records.get(&task_id)
                        {
                            return Lease {
                                task_id,
                                name: record.name.clone(),
                                input: record.input.clone(),
                                handler: Arc::clone(&record.handler),
                                state: Arc::clone(&self.state),
                                notify: Arc::clone(&self.notify),
                            };
                        }
                        continue;
                    }
                    other => other,
                }
            };

            // Gates have no change notification, so gated tasks are re-checked
            // on a fixed interval.
            match admission {
                Admission::Gated => {
                    tokio::select! {
                        _ = self.notify.notified() => {},
                        _ = tokio::time::sleep(self.gate_poll_interval) => {},
                    }
                }
                _ => self.notify.notified().await,
            }
        }
    }

    /// Subscribe to a task's status transitions.
    pub async fn observe(&self, task_id: TaskId) -> Result<StatusStream> {
        let state = self.state.lock().await;
        let record = state
            .records
            .get(&task_id)
            .ok_or(ChainError::UnknownTask(task_id))?;
        Ok(StatusStream {
            task_id,
            pending: Some(record.status),
            rx: record.subscribe(),
            finished: false,
        })
    }

    pub async fn status(&self, task_id: TaskId) -> Result<TaskStatus> {
        Ok(self.snapshot(task_id).await?.status)
    }

    pub async fn snapshot(&self, task_id: TaskId) -> Result<TaskSnapshot> {
        let state = self.state.lock().await;
        state
            .records
            .get(&task_id)
            .map(TaskSnapshot::from)
            .ok_or(ChainError::UnknownTask(task_id))
    }

    /// Full transition log, oldest first.
    pub async fn transitions(&self) -> Vec<TransitionRecord> {
        let state = self.state.lock().await;
        state.transitions.clone()
    }

    pub async fn counts_by_state(&self) -> StatusCounts {
        let state = self.state.lock().await;
        state.counts_by_state()
    }

    pub async fn pipeline_state(&self, pipeline_id: PipelineId) -> Result<PipelineState> {
        let state = self.state.lock().await;
        let task_ids = state
            .pipelines
            .get(&pipeline_id)
            .ok_or(ChainError::UnknownPipeline(pipeline_id))?;
        let statuses: Vec<TaskStatus> = task_ids
            .iter()
            .filter_map(|id| state.records.get(id).map(|r| r.status))
            .collect();
        Ok(PipelineState::from_statuses(&statuses))
    }

    /// Cancel every task of the pipeline that has not started yet.
    ///
    /// A task that is already Running finishes normally. Returns the number of
    /// cancelled tasks.
    pub async fn cancel_pipeline(&self, pipeline_id: PipelineId) -> Result<usize> {
        let mut state = self.state.lock().await;
        let task_ids = state
            .pipelines
            .get(&pipeline_id)
            .cloned()
            .ok_or(ChainError::UnknownPipeline(pipeline_id))?;

        let mut cancelled = 0;
        for task_id in task_ids {
            let enqueued = state
                .records
                .get(&task_id)
                .is_some_and(|r| r.status == TaskStatus::Enqueued);
            if enqueued {
                state.transition(task_id, TaskStatus::Cancelled, Some("pipeline cancelled".to_string()))?;
                state.graph.remove_task(task_id);
                cancelled += 1;
            }
        }
        info!(pipeline = %pipeline_id, cancelled, "pipeline cancelled");
        Ok(cancelled)
    }
}

fn join_failure_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("task aborted: {err}");
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("task panicked: {message}")
}

fn wake_workers(notify: &Notify) {
    notify.notify_waiters();
    // no waiter right now: leave a permit for the next one
    notify.notify_one();
}

/// A task handed to a worker.
/// The worker owns this lease and must either `ack` or `fail`.
pub struct Lease {
    task_id: TaskId,
    name: TaskName,
    input: TaskInput,
    handler: Arc<dyn TaskHandler>,
    state: Arc<Mutex<SchedulerState>>,
    notify: Arc<Notify>,
}

impl Lease {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn input(&self) -> &TaskInput {
        &self.input
    }

    /// Run the task's unit of work on its own tokio task.
    ///
    /// A panicking handler comes back as `TaskFailed`, so the lease can
    /// still be failed and the rest of the chain cancelled.
    pub async fn execute(&self) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let input = self.input.clone();
        match tokio::spawn(async move { handler.handle(&input).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(ChainError::TaskFailed {
                task: self.name.clone(),
                reason: join_failure_reason(join_err),
            }),
        }
    }

    /// Mark success and unblock the next task of the chain.
    pub async fn ack(self) -> Result<()> {
        let unblocked = {
            let mut state = self.state.lock().await;
            state.transition(self.task_id, TaskStatus::Succeeded, None)?;
            state.graph.release(self.task_id)
        };
        info!(task = %self.name, task_id = %self.task_id, "task succeeded");
        if !unblocked.is_empty() {
            wake_workers(&self.notify);
        }
        Ok(())
    }

    /// Mark failure. The rest of the chain is cancelled and never admitted.
    pub async fn fail(self, reason: String) -> Result<()> {
        let cancelled = {
            let mut state = self.state.lock().await;
            state.transition(self.task_id, TaskStatus::Failed, Some(reason.clone()))?;
            state.cancel_downstream(
                self.task_id,
                &format!("upstream task '{}' failed", self.name),
            )
        };
        warn!(
            task = %self.name,
            task_id = %self.task_id,
            %reason,
            cancelled = cancelled.len(),
            "task failed"
        );
        Ok(())
    }
}

/// Push-based stream of one task's status.
///
/// Yields the status current at subscription time, then every later
/// transition, and ends right after the terminal one: each subscriber sees
/// the terminal status exactly once.
pub struct StatusStream {
    task_id: TaskId,
    pending: Option<TaskStatus>,
    rx: broadcast::Receiver<TaskStatus>,
    finished: bool,
}

impl StatusStream {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub async fn next(&mut self) -> Option<TaskStatus> {
        if self.finished {
            return None;
        }
        let status = match self.pending.take() {
            Some(status) => status,
            None => loop {
                match self.rx.recv().await {
                    Ok(status) => break status,
                    // the terminal status is always the last one sent
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => {
                        self.finished = true;
                        return None;
                    }
                }
            },
        };
        if status.is_terminal() {
            self.finished = true;
        }
        Some(status)
    }

    /// Drain the stream; returns the terminal status.
    pub async fn terminal(mut self) -> Option<TaskStatus> {
        let mut last = None;
        while let Some(status) = self.next().await {
            last = Some(status);
        }
        last.filter(|s| s.is_terminal())
    }
}
