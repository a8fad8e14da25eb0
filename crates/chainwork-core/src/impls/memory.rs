//! Recording sinks - テスト・デバッグ用
//!
//! Every display call and every notice is kept in memory so that tests can
//! assert on exact order and content.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::ChannelId;
use crate::error::{ChainError, Result};
use crate::ports::{DisplayKey, DisplaySink, DisplaySpec, Notice, NoticeSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Channel { channel: ChannelId, name: String },
    Posted { key: DisplayKey, spec: DisplaySpec },
    Removed { key: DisplayKey },
}

/// DisplaySink that records every call.
///
/// # 実装詳細
/// - std の Mutex (countdown スレッドから同期的に呼ばれるため)
/// - poison は無視して中身をそのまま使う
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    events: Mutex<Vec<DisplayEvent>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DisplayEvent> {
        self.lock().clone()
    }

    /// Every spec posted under `key`, oldest first.
    pub fn posts_for(&self, key: DisplayKey) -> Vec<DisplaySpec> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                DisplayEvent::Posted { key: k, spec } if *k == key => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    /// Was the last event for `key` a post?
    pub fn is_showing(&self, key: DisplayKey) -> bool {
        self.lock()
            .iter()
            .rev()
            .find_map(|event| match event {
                DisplayEvent::Posted { key: k, .. } if *k == key => Some(true),
                DisplayEvent::Removed { key: k } if *k == key => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DisplayEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySink for RecordingDisplay {
    fn register_channel(&self, channel: &ChannelId, name: &str) {
        self.lock().push(DisplayEvent::Channel {
            channel: channel.clone(),
            name: name.to_string(),
        });
    }

    fn post(&self, key: DisplayKey, spec: &DisplaySpec) {
        self.lock().push(DisplayEvent::Posted {
            key,
            spec: spec.clone(),
        });
    }

    fn remove(&self, key: DisplayKey) {
        self.lock().push(DisplayEvent::Removed { key });
    }
}

/// NoticeSink that records every notice and lets tests wait for one.
#[derive(Debug)]
pub struct RecordingNotices {
    tx: watch::Sender<Vec<Notice>>,
}

impl Default for RecordingNotices {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingNotices {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self { tx }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.tx.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.tx
            .borrow()
            .iter()
            .map(|n| n.message().to_string())
            .collect()
    }

    /// Wait until `pred` holds for the recorded notices.
    pub async fn wait_until<F>(&self, mut pred: F, waited: Duration) -> Result<Vec<Notice>>
    where
        F: FnMut(&[Notice]) -> bool,
    {
        let mut rx = self.tx.subscribe();
        let result = tokio::time::timeout(waited, rx.wait_for(|notices| pred(notices))).await;
        match result {
            Ok(Ok(notices)) => Ok(notices.clone()),
            Ok(Err(_)) => Err(ChainError::Closed("notice recorder".to_string())),
            Err(_) => Err(ChainError::Timeout {
                waited,
                what: "notices".to_string(),
            }),
        }
    }
}

impl NoticeSink for RecordingNotices {
    fn notice(&self, notice: Notice) {
        self.tx.send_modify(|notices| notices.push(notice));
    }
}
