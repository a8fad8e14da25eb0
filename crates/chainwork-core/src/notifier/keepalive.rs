//! Foreground markers: which notifier instances are keeping the host alive.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::ports::DisplayKey;

#[derive(Debug, Clone, Default)]
pub struct ForegroundRegistry {
    active: Arc<Mutex<HashSet<DisplayKey>>>,
}

impl ForegroundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the marker for `key`. It stays up until the guard is dropped.
    pub fn acquire(&self, key: DisplayKey) -> ForegroundGuard {
        self.lock().insert(key);
        ForegroundGuard {
            key,
            active: Arc::clone(&self.active),
        }
    }

    pub fn is_active(&self, key: DisplayKey) -> bool {
        self.lock().contains(&key)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<DisplayKey>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases its marker on drop.
#[derive(Debug)]
pub struct ForegroundGuard {
    key: DisplayKey,
    active: Arc<Mutex<HashSet<DisplayKey>>>,
}

impl ForegroundGuard {
    pub fn key(&self) -> DisplayKey {
        self.key
    }
}

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
