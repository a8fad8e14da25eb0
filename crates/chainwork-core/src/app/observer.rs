//! CompletionObserver - タスク完了を監視して通知・後続処理を起動する
//!
//! One watcher per stage. Each watcher reacts to the first terminal status
//! of its task only; nothing after that re-triggers it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::{ChannelId, TaskId};
use crate::error::{ChainError, Result};
use crate::notifier::{ActivationRequest, NotifierService};
use crate::ports::{Notice, NoticeSink};
use crate::scheduler::{PipelineScheduler, StatusStream, TaskRef, TaskStatus};

/// Notifier to start once a stage succeeded.
#[derive(Clone)]
pub struct NotifierLaunch {
    pub service: Arc<NotifierService>,
    pub channel_id: ChannelId,
}

/// What to watch and how to report it.
#[derive(Clone)]
pub struct StageWatch {
    pub task: TaskRef,
    /// Shown in notices ("First", "Second", ...).
    pub label: String,
    pub launch: Option<NotifierLaunch>,
}

impl StageWatch {
    pub fn new(task: TaskRef, label: impl Into<String>) -> Self {
        Self {
            task,
            label: label.into(),
            launch: None,
        }
    }

    pub fn with_launch(mut self, service: Arc<NotifierService>, channel_id: ChannelId) -> Self {
        self.launch = Some(NotifierLaunch {
            service,
            channel_id,
        });
        self
    }
}

/// Outcome of one watched stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub label: String,
    pub task_id: TaskId,
    /// `None` if the status stream closed before a terminal status.
    pub status: Option<TaskStatus>,
    /// Channel id published by the launched notifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<ChannelId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct CompletionObserver {
    scheduler: Arc<PipelineScheduler>,
    notices: Arc<dyn NoticeSink>,
    completion_timeout: Option<Duration>,
}

impl CompletionObserver {
    pub fn new(
        scheduler: Arc<PipelineScheduler>,
        notices: Arc<dyn NoticeSink>,
        completion_timeout: Option<Duration>,
    ) -> Self {
        Self {
            scheduler,
            notices,
            completion_timeout,
        }
    }

    /// Subscribe to every stage, then spawn one watcher per stage.
    ///
    /// All subscriptions are taken before this returns.
    pub async fn watch(&self, stages: Vec<StageWatch>) -> Result<ObserverHandle> {
        let mut streams = Vec::with_capacity(stages.len());
        for stage in &stages {
            streams.push(self.scheduler.observe(stage.task.id).await?);
        }

        let joins = stages
            .into_iter()
            .zip(streams)
            .map(|(stage, stream)| {
                tokio::spawn(watch_stage(
                    stage,
                    stream,
                    Arc::clone(&self.scheduler),
                    Arc::clone(&self.notices),
                    self.completion_timeout,
                ))
            })
            .collect();
        Ok(ObserverHandle { joins })
    }
}

pub struct ObserverHandle {
    joins: Vec<JoinHandle<StageReport>>,
}

impl ObserverHandle {
    /// Wait for every watcher; reports come back in stage order.
    pub async fn join(self) -> Result<Vec<StageReport>> {
        let mut reports = Vec::with_capacity(self.joins.len());
        for join in self.joins {
            let report = join
                .await
                .map_err(|e| ChainError::Closed(format!("stage watcher: {e}")))?;
            reports.push(report);
        }
        Ok(reports)
    }
}

async fn watch_stage(
    stage: StageWatch,
    stream: StatusStream,
    scheduler: Arc<PipelineScheduler>,
    notices: Arc<dyn NoticeSink>,
    completion_timeout: Option<Duration>,
) -> StageReport {
    let StageWatch { task, label, launch } = stage;
    let mut report = StageReport {
        label: label.clone(),
        task_id: task.id,
        status: None,
        published: None,
        error: None,
    };

    let Some(status) = stream.terminal().await else {
        let message = format!("{label} process status was lost");
        warn!(stage = %label, task_id = %task.id, "status stream closed early");
        notices.notice(Notice::Error(message.clone()));
        report.error = Some(message);
        return report;
    };
    report.status = Some(status);

    match status {
        TaskStatus::Succeeded => {
            notices.notice(Notice::Info(format!("{label} process is done")));
            if let Some(launch) = launch {
                let service = Arc::clone(&launch.service);
                match run_notifier(launch, completion_timeout).await {
                    Ok(published) => {
                        let message = service.profile().completion_message(&published);
                        info!(stage = %label, channel = %published, "notifier completed");
                        notices.notice(Notice::Info(message));
                        report.published = Some(published);
                    }
                    Err(e) => {
                        warn!(stage = %label, error = %e, "notifier did not complete");
                        notices.notice(Notice::Error(e.to_string()));
                        report.error = Some(e.to_string());
                    }
                }
            }
        }
        TaskStatus::Failed => {
            let reason = scheduler
                .snapshot(task.id)
                .await
                .ok()
                .and_then(|s| s.last_error)
                .unwrap_or_else(|| "unknown error".to_string());
            notices.notice(Notice::Error(format!("{label} process failed: {reason}")));
            report.error = Some(reason);
        }
        TaskStatus::Cancelled => {
            notices.notice(Notice::Error(format!("{label} process was cancelled")));
        }
        // terminal() only yields terminal statuses
        TaskStatus::Enqueued | TaskStatus::Running => {}
    }
    report
}

/// Launch the notifier and wait for its completion value.
async fn run_notifier(launch: NotifierLaunch, timeout: Option<Duration>) -> Result<ChannelId> {
    // subscribe before launching so the publish cannot be missed
    let mut completion = launch.service.subscribe_next();
    let handle = launch
        .service
        .launch(ActivationRequest::new(launch.channel_id))?;

    let published = match timeout {
        Some(waited) => completion.recv_timeout(waited).await,
        None => completion.recv().await,
    };
    if published.is_err() {
        handle.teardown();
    }
    handle.join().await?;

    // the countdown may finish between the timeout and the teardown
    match published {
        Err(err) => completion.try_recv().ok_or(err),
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CountdownConfig;
    use crate::domain::{TaskInput, TaskName};
    use crate::impls::memory::{RecordingDisplay, RecordingNotices};
    use crate::notifier::{ForegroundRegistry, NotifierProfile};
    use crate::ports::{AlwaysOpen, DisplayKey, DisplaySink, DisplaySpec};
    use crate::scheduler::ChainLink;
    use crate::typed::TaskHandler;
    use async_trait::async_trait;

    const WAIT: Duration = Duration::from_secs(2);

    struct Named(&'static str);

    #[async_trait]
    impl TaskHandler for Named {
        fn name(&self) -> TaskName {
            TaskName::new(self.0)
        }

        async fn handle(&self, _input: &TaskInput) -> Result<()> {
            Ok(())
        }
    }

    /// Holds the countdown thread inside its last tick until released.
    struct HoldLastTick {
        release: std::sync::Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl DisplaySink for HoldLastTick {
        fn register_channel(&self, _channel: &ChannelId, _name: &str) {}

        fn post(&self, _key: DisplayKey, spec: &DisplaySpec) {
            if spec.body.starts_with("0 seconds") {
                let release = self.release.lock().unwrap().take();
                if let Some(rx) = release {
                    let _ = rx.recv();
                }
            }
        }

        fn remove(&self, _key: DisplayKey) {}
    }

    struct Fixture {
        scheduler: Arc<PipelineScheduler>,
        notices: Arc<RecordingNotices>,
        tasks: Vec<TaskRef>,
    }

    async fn fixture() -> Fixture {
        let scheduler = Arc::new(PipelineScheduler::new(Duration::from_millis(5)));
        let links = ["first", "second"]
            .into_iter()
            .map(|name| {
                ChainLink::new(
                    Arc::new(Named(name)),
                    TaskInput::new("inId", "001"),
                    Arc::new(AlwaysOpen),
                )
            })
            .collect();
        let handle = scheduler.enqueue_chain(links).await.unwrap();
        Fixture {
            scheduler,
            notices: Arc::new(RecordingNotices::new()),
            tasks: handle.tasks().to_vec(),
        }
    }

    fn notifier(tick_ms: u64) -> Arc<NotifierService> {
        Arc::new(NotifierService::new(
            NotifierProfile::first(&CountdownConfig {
                seconds: 5,
                tick_ms,
            }),
            Arc::new(RecordingDisplay::new()),
            ForegroundRegistry::new(),
        ))
    }

    #[tokio::test]
    async fn success_launches_the_notifier_and_reports_its_completion() {
        let f = fixture().await;
        let service = notifier(1);
        let observer = CompletionObserver::new(
            Arc::clone(&f.scheduler),
            f.notices.clone(),
            Some(WAIT),
        );
        let handle = observer
            .watch(vec![
                StageWatch::new(f.tasks[0].clone(), "First")
                    .with_launch(Arc::clone(&service), ChannelId::new("001")),
            ])
            .await
            .unwrap();

        f.scheduler.lease().await.ack().await.unwrap();
        let reports = handle.join().await.unwrap();

        assert_eq!(reports[0].status, Some(TaskStatus::Succeeded));
        assert_eq!(reports[0].published, Some(ChannelId::new("001")));
        assert_eq!(
            f.notices.messages(),
            vec![
                "First process is done",
                "Process for Notification Channel ID 001 is done!",
            ]
        );
        assert!(!service.is_active());
    }

    #[tokio::test]
    async fn failure_and_cancellation_are_errors() {
        let f = fixture().await;
        let observer =
            CompletionObserver::new(Arc::clone(&f.scheduler), f.notices.clone(), Some(WAIT));
        let handle = observer
            .watch(vec![
                StageWatch::new(f.tasks[0].clone(), "First"),
                StageWatch::new(f.tasks[1].clone(), "Second"),
            ])
            .await
            .unwrap();

        f.scheduler
            .lease()
            .await
            .fail("disk full".to_string())
            .await
            .unwrap();
        let reports = handle.join().await.unwrap();

        assert_eq!(reports[0].status, Some(TaskStatus::Failed));
        assert_eq!(reports[0].error.as_deref(), Some("disk full"));
        assert_eq!(reports[1].status, Some(TaskStatus::Cancelled));

        let notices = f.notices.notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(Notice::is_error));
        assert!(notices.contains(&Notice::Error("First process failed: disk full".to_string())));
        assert!(notices.contains(&Notice::Error("Second process was cancelled".to_string())));
    }

    #[tokio::test]
    async fn late_watch_still_reacts_once() {
        let f = fixture().await;
        f.scheduler.lease().await.ack().await.unwrap();

        // the task finished before anyone watched it
        let observer =
            CompletionObserver::new(Arc::clone(&f.scheduler), f.notices.clone(), Some(WAIT));
        let reports = observer
            .watch(vec![StageWatch::new(f.tasks[0].clone(), "First")])
            .await
            .unwrap()
            .join()
            .await
            .unwrap();

        assert_eq!(reports[0].status, Some(TaskStatus::Succeeded));
        assert_eq!(f.notices.messages(), vec!["First process is done"]);
    }

    #[tokio::test]
    async fn completion_timeout_is_reported() {
        let f = fixture().await;
        // countdown far longer than the timeout
        let service = notifier(200);
        let observer = CompletionObserver::new(
            Arc::clone(&f.scheduler),
            f.notices.clone(),
            Some(Duration::from_millis(20)),
        );
        let handle = observer
            .watch(vec![
                StageWatch::new(f.tasks[0].clone(), "First")
                    .with_launch(Arc::clone(&service), ChannelId::new("001")),
            ])
            .await
            .unwrap();

        f.scheduler.lease().await.ack().await.unwrap();
        let reports = tokio::time::timeout(WAIT, handle.join()).await.unwrap().unwrap();

        assert_eq!(reports[0].published, None);
        assert!(reports[0].error.as_deref().unwrap().contains("timed out"));
        let notices = f.notices.notices();
        assert_eq!(notices[0], Notice::Info("First process is done".to_string()));
        assert!(notices[1].is_error());
        assert_eq!(service.completion().latest(), None);
    }

    #[tokio::test]
    async fn publish_racing_the_timeout_still_counts() {
        let f = fixture().await;
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let service = Arc::new(NotifierService::new(
            NotifierProfile::first(&CountdownConfig {
                seconds: 5,
                tick_ms: 1,
            }),
            Arc::new(HoldLastTick {
                release: std::sync::Mutex::new(Some(release_rx)),
            }),
            ForegroundRegistry::new(),
        ));
        let observer = CompletionObserver::new(
            Arc::clone(&f.scheduler),
            f.notices.clone(),
            Some(Duration::from_millis(30)),
        );
        let handle = observer
            .watch(vec![
                StageWatch::new(f.tasks[0].clone(), "First")
                    .with_launch(Arc::clone(&service), ChannelId::new("001")),
            ])
            .await
            .unwrap();

        f.scheduler.lease().await.ack().await.unwrap();
        // the wait times out while the last tick is still being posted
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = release_tx.send(());
        });
        let reports = tokio::time::timeout(WAIT, handle.join()).await.unwrap().unwrap();

        assert_eq!(reports[0].published, Some(ChannelId::new("001")));
        assert_eq!(reports[0].error, None);
        assert_eq!(service.completion().latest(), Some(ChannelId::new("001")));
        assert_eq!(
            f.notices.messages(),
            vec![
                "First process is done",
                "Process for Notification Channel ID 001 is done!",
            ]
        );
    }

    #[tokio::test]
    async fn rejected_launch_is_reported() {
        let f = fixture().await;
        let service = notifier(1);
        let observer =
            CompletionObserver::new(Arc::clone(&f.scheduler), f.notices.clone(), Some(WAIT));
        let handle = observer
            .watch(vec![
                StageWatch::new(f.tasks[0].clone(), "First")
                    .with_launch(Arc::clone(&service), ChannelId::new("")),
            ])
            .await
            .unwrap();

        f.scheduler.lease().await.ack().await.unwrap();
        let reports = handle.join().await.unwrap();

        assert!(reports[0].error.as_deref().unwrap().contains("contract violation"));
        assert_eq!(service.completion().latest(), None);
    }

    #[tokio::test]
    async fn watching_an_unknown_task_fails() {
        let f = fixture().await;
        let observer =
            CompletionObserver::new(Arc::clone(&f.scheduler), f.notices.clone(), Some(WAIT));
        let unknown = TaskRef {
            id: TaskId::generate(),
            name: TaskName::new("ghost"),
        };
        assert!(matches!(
            observer.watch(vec![StageWatch::new(unknown, "Ghost")]).await,
            Err(ChainError::UnknownTask(_))
        ));
    }
}
