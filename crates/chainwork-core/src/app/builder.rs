//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;

use tracing::info;

use super::observer::{CompletionObserver, StageWatch};
use super::pipeline::PipelineRun;
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::notifier::{ForegroundRegistry, NotifierProfile, NotifierService};
use crate::ports::{ConditionGate, DisplaySink, NoticeSink};
use crate::scheduler::{ChainLink, PipelineScheduler, WorkerGroup};
use crate::typed::{FirstTask, SecondTask, ThirdTask, TypedHandler};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .config(config)
///     .display(Arc::new(TracingDisplay))
///     .notices(Arc::new(ConsoleNotices))
///     .gate(Arc::new(connectivity.gate()))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に必須コンポーネントと config を検証
/// - 不足があれば BuildError を返す
#[derive(Default)]
pub struct AppBuilder {
    config: Option<ChainConfig>,
    display: Option<Arc<dyn DisplaySink>>,
    notices: Option<Arc<dyn NoticeSink>>,
    gate: Option<Arc<dyn ConditionGate>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}. Call AppBuilder::{0}() before build().")]
    MissingComponent(&'static str),

    #[error("invalid config: {0}")]
    InvalidConfig(#[source] ChainError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Optional; defaults to `ChainConfig::default()`.
    pub fn config(mut self, config: ChainConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn display(mut self, display: Arc<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn notices(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Precondition every stage task waits for.
    pub fn gate(mut self, gate: Arc<dyn ConditionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> std::result::Result<App, BuildError> {
        let display = self.display.ok_or(BuildError::MissingComponent("display"))?;
        let notices = self.notices.ok_or(BuildError::MissingComponent("notices"))?;
        let gate = self.gate.ok_or(BuildError::MissingComponent("gate"))?;
        let config = self.config.unwrap_or_default();
        config.validate().map_err(BuildError::InvalidConfig)?;

        let foreground = ForegroundRegistry::new();
        let first_notifier = Arc::new(NotifierService::new(
            NotifierProfile::first(&config.countdown),
            Arc::clone(&display),
            foreground.clone(),
        ));
        let second_notifier = Arc::new(NotifierService::new(
            NotifierProfile::second(&config.countdown),
            display,
            foreground.clone(),
        ));

        Ok(App {
            scheduler: Arc::new(PipelineScheduler::from_config(&config.scheduler)),
            config,
            gate,
            notices,
            first_notifier,
            second_notifier,
            foreground,
        })
    }
}

/// Wired application: one scheduler and two notifier services.
pub struct App {
    config: ChainConfig,
    scheduler: Arc<PipelineScheduler>,
    gate: Arc<dyn ConditionGate>,
    notices: Arc<dyn NoticeSink>,
    first_notifier: Arc<NotifierService>,
    second_notifier: Arc<NotifierService>,
    foreground: ForegroundRegistry,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<PipelineScheduler> {
        &self.scheduler
    }

    pub fn first_notifier(&self) -> &Arc<NotifierService> {
        &self.first_notifier
    }

    pub fn second_notifier(&self) -> &Arc<NotifierService> {
        &self.second_notifier
    }

    pub fn foreground(&self) -> &ForegroundRegistry {
        &self.foreground
    }

    /// Enqueue the three-stage chain for `identifier` and start running it.
    ///
    /// - every stage gets `identifier` under its input key
    /// - Second succeeded -> first notifier, Third succeeded -> second notifier
    pub async fn start(&self, identifier: &str) -> Result<PipelineRun> {
        let work = self.config.tasks.work();
        let links = vec![
            ChainLink::new(
                Arc::new(TypedHandler::new(FirstTask { work })),
                TypedHandler::<FirstTask>::input(identifier),
                Arc::clone(&self.gate),
            ),
            ChainLink::new(
                Arc::new(TypedHandler::new(SecondTask { work })),
                TypedHandler::<SecondTask>::input(identifier),
                Arc::clone(&self.gate),
            ),
            ChainLink::new(
                Arc::new(TypedHandler::new(ThirdTask { work })),
                TypedHandler::<ThirdTask>::input(identifier),
                Arc::clone(&self.gate),
            ),
        ];
        let handle = self.scheduler.enqueue_chain(links).await?;

        let stages = match handle.tasks() {
            [first, second, third] => vec![
                StageWatch::new(first.clone(), "First"),
                StageWatch::new(second.clone(), "Second").with_launch(
                    Arc::clone(&self.first_notifier),
                    self.first_notifier.profile().channel.clone(),
                ),
                StageWatch::new(third.clone(), "Third").with_launch(
                    Arc::clone(&self.second_notifier),
                    self.second_notifier.profile().channel.clone(),
                ),
            ],
            other => {
                return Err(ChainError::ContractViolation(format!(
                    "expected a three-stage chain, got {} tasks",
                    other.len()
                )));
            }
        };

        let observer = CompletionObserver::new(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.notices),
            self.config.observer.completion_timeout(),
        );
        let watching = observer.watch(stages).await?;
        let workers = WorkerGroup::spawn(self.config.scheduler.workers, Arc::clone(&self.scheduler));

        info!(pipeline = %handle.id(), identifier, "pipeline started");
        Ok(PipelineRun::new(
            identifier.to_string(),
            handle,
            Arc::clone(&self.scheduler),
            workers,
            watching,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::memory::{RecordingDisplay, RecordingNotices};
    use crate::ports::AlwaysOpen;

    fn complete() -> AppBuilder {
        AppBuilder::new()
            .display(Arc::new(RecordingDisplay::new()))
            .notices(Arc::new(RecordingNotices::new()))
            .gate(Arc::new(AlwaysOpen))
    }

    #[test]
    fn build_with_all_components_succeeds() {
        let app = complete().build().unwrap();
        assert_eq!(app.config(), &ChainConfig::default());
        assert_eq!(app.first_notifier().profile().channel.as_str(), "001");
        assert_eq!(app.second_notifier().profile().channel.as_str(), "002");
    }

    #[test]
    fn build_without_display_fails() {
        let result = AppBuilder::new()
            .notices(Arc::new(RecordingNotices::new()))
            .gate(Arc::new(AlwaysOpen))
            .build();
        assert!(matches!(result, Err(BuildError::MissingComponent("display"))));
    }

    #[test]
    fn build_without_gate_fails() {
        let result = AppBuilder::new()
            .display(Arc::new(RecordingDisplay::new()))
            .notices(Arc::new(RecordingNotices::new()))
            .build();
        let err = result.err().unwrap();
        assert!(matches!(err, BuildError::MissingComponent("gate")));
        assert!(err.to_string().contains("AppBuilder::gate()"));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = ChainConfig::default();
        config.scheduler.workers = 0;
        let result = complete().config(config).build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }
}
