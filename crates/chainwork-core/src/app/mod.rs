//! App - アプリケーション層
//!
//! # 構成
//! - **builder**: AppBuilder（Fail-fast 構築）と App（パイプライン起動）
//! - **observer**: CompletionObserver（完了監視と通知プロセスの起動）
//! - **pipeline**: PipelineRun / RunSummary

pub mod builder;
pub mod observer;
pub mod pipeline;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::observer::{CompletionObserver, NotifierLaunch, ObserverHandle, StageReport, StageWatch};
pub use self::pipeline::{PipelineRun, RunSummary};
