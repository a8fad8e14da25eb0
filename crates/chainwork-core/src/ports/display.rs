//! DisplaySink port - 永続表示（ongoing notification）の抽象化
//!
//! The core hands the sink a stable `DisplayKey` per notifier so that
//! re-posting replaces the display instead of duplicating it.

use std::fmt;

use crate::domain::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayKey(pub u32);

impl fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

/// Content of a persistent display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySpec {
    pub channel: ChannelId,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub tap_action: String,
    pub ticker: Option<String>,
    /// Re-render without an audible/visual alert.
    pub silent: bool,
    /// Not dismissible by the user.
    pub ongoing: bool,
}

impl DisplaySpec {
    /// Same display, new body, rendered silently.
    pub fn silent_update(&self, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            silent: true,
            ..self.clone()
        }
    }
}

/// Implementations are called from the notifier's countdown thread, so they
/// must not block for long.
pub trait DisplaySink: Send + Sync {
    fn register_channel(&self, channel: &ChannelId, name: &str);

    /// Show or replace the display identified by `key`.
    fn post(&self, key: DisplayKey, spec: &DisplaySpec);

    fn remove(&self, key: DisplayKey);
}
