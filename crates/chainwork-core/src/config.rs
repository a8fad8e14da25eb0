//! Configuration for the chain scheduler, the stage tasks and the notifiers.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Scheduler and worker settings.
    pub scheduler: SchedulerConfig,
    /// Stage task settings.
    pub tasks: TaskConfig,
    /// Notifier countdown settings.
    pub countdown: CountdownConfig,
    /// Completion observer settings.
    pub observer: ObserverConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of workers leasing tasks.
    pub workers: usize,
    /// How often a task blocked on its gate is re-checked.
    pub gate_poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            gate_poll_interval_ms: 250,
        }
    }
}

impl SchedulerConfig {
    pub fn gate_poll_interval(&self) -> Duration {
        Duration::from_millis(self.gate_poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Simulated work per stage task.
    pub work_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { work_ms: 3000 }
    }
}

impl TaskConfig {
    pub fn work(&self) -> Duration {
        Duration::from_millis(self.work_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// Countdown start; the display is updated `seconds + 1` times.
    pub seconds: u32,
    /// Pause before each display update.
    pub tick_ms: u64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            seconds: 5,
            tick_ms: 1000,
        }
    }
}

impl CountdownConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// How long to wait for a notifier to publish its channel id.
    /// `0` waits forever.
    pub completion_timeout_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            completion_timeout_ms: 60_000,
        }
    }
}

impl ObserverConfig {
    pub fn completion_timeout(&self) -> Option<Duration> {
        (self.completion_timeout_ms > 0).then(|| Duration::from_millis(self.completion_timeout_ms))
    }
}

impl ChainConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// values are out of range.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ChainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ChainError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.workers == 0 {
            return Err(ChainError::Config("scheduler.workers must be at least 1".into()));
        }
        if self.scheduler.gate_poll_interval_ms == 0 {
            return Err(ChainError::Config(
                "scheduler.gate_poll_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_timings() {
        let config = ChainConfig::default();
        assert_eq!(config.scheduler.workers, 1);
        assert_eq!(config.tasks.work(), Duration::from_secs(3));
        assert_eq!(config.countdown.seconds, 5);
        assert_eq!(config.countdown.tick(), Duration::from_secs(1));
        assert_eq!(
            config.observer.completion_timeout(),
            Some(Duration::from_secs(60))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = ChainConfig::from_toml_str(
            r#"
            [countdown]
            tick_ms = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.countdown.tick_ms, 10);
        assert_eq!(config.countdown.seconds, 5);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn zero_timeout_means_wait_forever() {
        let config = ChainConfig::from_toml_str("[observer]\ncompletion_timeout_ms = 0\n").unwrap();
        assert_eq!(config.observer.completion_timeout(), None);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = ChainConfig::from_toml_str("[scheduler]\nworkers = 0\n").unwrap_err();
        assert!(matches!(err, ChainError::Config(msg) if msg.contains("workers")));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err =
            ChainConfig::from_toml_str("[scheduler]\ngate_poll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = ChainConfig::from_toml_str("scheduler = [").unwrap_err();
        assert!(matches!(err, ChainError::Config(_)));
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ChainConfig::from_file(Path::new("/nonexistent/chainwork.toml"));
        assert!(matches!(result, Err(ChainError::Io(_))));
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let mut config = ChainConfig::default();
        config.countdown.seconds = 3;
        config.observer.completion_timeout_ms = 0;
        let text = config.to_toml_string().unwrap();
        assert_eq!(ChainConfig::from_toml_str(&text).unwrap(), config);
    }
}
