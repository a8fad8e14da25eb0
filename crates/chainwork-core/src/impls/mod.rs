//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **RecordingDisplay / RecordingNotices**: テスト用、全呼び出しを記録
//! - **TracingDisplay / ConsoleNotices**: CLI 用

pub mod console;
pub mod memory;

pub use self::console::{ConsoleNotices, TracingDisplay};
pub use self::memory::{DisplayEvent, RecordingDisplay, RecordingNotices};
