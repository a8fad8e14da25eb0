//! TaskHandler - object-safe な実行インターフェース
//!
//! `TypedHandler<T>` で `Task` を型消去し、scheduler が
//! `Arc<dyn TaskHandler>` として保持できるようにします。

use async_trait::async_trait;

use super::task::Task;
use crate::domain::{TaskInput, TaskName};
use crate::error::ChainError;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> TaskName;

    async fn handle(&self, input: &TaskInput) -> Result<(), ChainError>;
}

pub struct TypedHandler<T: Task> {
    task: T,
}

impl<T: Task> TypedHandler<T> {
    pub fn new(task: T) -> Self {
        Self { task }
    }

    /// Build the input this task type expects.
    pub fn input(id: impl Into<String>) -> TaskInput {
        TaskInput::new(T::INPUT_KEY, id)
    }
}

#[async_trait]
impl<T: Task> TaskHandler for TypedHandler<T> {
    fn name(&self) -> TaskName {
        TaskName::new(T::NAME)
    }

    async fn handle(&self, input: &TaskInput) -> Result<(), ChainError> {
        if input.key() != T::INPUT_KEY {
            return Err(ChainError::ContractViolation(format!(
                "task '{}' expects input key '{}', got '{}'",
                T::NAME,
                T::INPUT_KEY,
                input.key()
            )));
        }
        self.task.run(input.value()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Task for Echo {
        const NAME: &'static str = "echo";
        const INPUT_KEY: &'static str = "echoId";

        async fn run(&self, id: &str) -> Result<(), ChainError> {
            self.seen.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn typed_handler_passes_the_value_through() {
        let handler = TypedHandler::new(Echo::default());
        handler
            .handle(&TypedHandler::<Echo>::input("001"))
            .await
            .unwrap();

        assert_eq!(handler.name().as_str(), "echo");
        assert_eq!(*handler.task.seen.lock().unwrap(), vec!["001".to_string()]);
    }

    #[tokio::test]
    async fn wrong_input_key_is_a_contract_violation() {
        let handler = TypedHandler::new(Echo::default());
        let err = handler
            .handle(&TaskInput::new("inId", "001"))
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::ContractViolation(_)));
        assert!(handler.task.seen.lock().unwrap().is_empty());
    }
}
