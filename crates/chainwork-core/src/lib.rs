//! chainwork-core
//!
//! Chained background tasks gated on preconditions, plus foreground
//! notifier processes that publish a completion value.
//!
//! # モジュール構成
//! - **domain**: ID と値型（TaskId, PipelineId, TaskInput, ChannelId）
//! - **scheduler**: チェーンの順序制御（PipelineScheduler, WorkerGroup）
//! - **typed**: 型付き Task API（Task trait, TypedHandler, 3 つのステージ）
//! - **notifier**: カウントダウン通知プロセスと CompletionCell
//! - **app**: ワイヤリング（AppBuilder, CompletionObserver, PipelineRun）
//! - **ports / impls**: ホスト側インターフェースとその実装

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod notifier;
pub mod observability;
pub mod ports;
pub mod scheduler;
pub mod typed;

pub use app::{App, AppBuilder, PipelineRun, RunSummary};
pub use config::ChainConfig;
pub use error::{ChainError, Result};
