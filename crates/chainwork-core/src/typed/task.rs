//! Task trait - 型付き Task の定義
//!
//! 各 Task 型は名前と入力キーを associated const で宣言します。

use async_trait::async_trait;

use crate::error::ChainError;

/// A typed unit of work.
///
/// # 使用例
/// ```ignore
/// struct Upload;
///
/// #[async_trait]
/// impl Task for Upload {
///     const NAME: &'static str = "upload";
///     const INPUT_KEY: &'static str = "inId";
///
///     async fn run(&self, id: &str) -> Result<(), ChainError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    const NAME: &'static str;

    /// Key under which this task expects its identifier.
    const INPUT_KEY: &'static str;

    async fn run(&self, id: &str) -> Result<(), ChainError>;
}
