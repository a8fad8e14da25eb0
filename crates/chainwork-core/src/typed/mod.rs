//! Typed - 型付き Task API
//!
//! # 二層構造
//! - **表層（Typed）**: `Task` trait - 名前と入力キーを型で固定
//! - **内部（Dyn）**: `TaskHandler` trait - object-safe, scheduler が保持

pub mod handler;
pub mod stages;
pub mod task;

pub use self::handler::{TaskHandler, TypedHandler};
pub use self::stages::{FirstTask, SecondTask, ThirdTask};
pub use self::task::Task;
