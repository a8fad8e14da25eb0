//! Static description of one notifier service.

use std::time::Duration;

use crate::config::CountdownConfig;
use crate::domain::ChannelId;
use crate::ports::{DisplayKey, DisplaySpec};

const ICON: &str = "ic_launcher_foreground";
const TAP_ACTION: &str = "open:main";

/// Everything that distinguishes one notifier service from another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierProfile {
    /// Service name, also the completion cell name ("first", "second").
    pub name: String,
    /// Stable key: re-posting with it replaces the display.
    pub key: DisplayKey,
    pub channel: ChannelId,
    pub channel_name: String,
    /// Name of the dedicated countdown thread.
    pub thread_name: String,
    pub title: String,
    pub body: String,
    pub ticker: Option<String>,
    /// Completion message; `{id}` is replaced with the published channel id.
    pub completion_template: String,
    pub countdown_seconds: u32,
    pub tick: Duration,
}

impl NotifierProfile {
    pub fn first(countdown: &CountdownConfig) -> Self {
        Self {
            name: "first".to_string(),
            key: DisplayKey(0xCA7),
            channel: ChannelId::new("001"),
            channel_name: "001 Channel".to_string(),
            thread_name: "SecondThread".to_string(),
            title: "Second worker process is done".to_string(),
            body: "Check it out!".to_string(),
            ticker: Some("Second worker process is done, check it out!".to_string()),
            completion_template: "Process for Notification Channel ID {id} is done!".to_string(),
            countdown_seconds: countdown.seconds,
            tick: countdown.tick(),
        }
    }

    pub fn second(countdown: &CountdownConfig) -> Self {
        Self {
            name: "second".to_string(),
            key: DisplayKey(0xCA8),
            channel: ChannelId::new("002"),
            channel_name: "002 Channel".to_string(),
            thread_name: "ThirdThread".to_string(),
            title: "Third worker process is done".to_string(),
            body: "Countdown for second service!".to_string(),
            ticker: Some("Third worker process is done, launching second service!".to_string()),
            completion_template: "Process for Second Notification Channel ID {id} is done!"
                .to_string(),
            countdown_seconds: countdown.seconds,
            tick: countdown.tick(),
        }
    }

    /// The initial ongoing display.
    pub fn display(&self) -> DisplaySpec {
        DisplaySpec {
            channel: self.channel.clone(),
            title: self.title.clone(),
            body: self.body.clone(),
            icon: ICON.to_string(),
            tap_action: TAP_ACTION.to_string(),
            ticker: self.ticker.clone(),
            silent: false,
            ongoing: true,
        }
    }

    pub fn completion_message(&self, id: &ChannelId) -> String {
        self.completion_template.replace("{id}", id.as_str())
    }
}

pub fn countdown_body(remaining: u32) -> String {
    format!("{remaining} seconds until last warning")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_do_not_share_identity() {
        let countdown = CountdownConfig::default();
        let first = NotifierProfile::first(&countdown);
        let second = NotifierProfile::second(&countdown);

        assert_ne!(first.key, second.key);
        assert_ne!(first.channel, second.channel);
        assert_ne!(first.thread_name, second.thread_name);
        assert_ne!(first.name, second.name);
    }

    #[test]
    fn completion_messages() {
        let countdown = CountdownConfig::default();
        assert_eq!(
            NotifierProfile::first(&countdown).completion_message(&ChannelId::new("001")),
            "Process for Notification Channel ID 001 is done!"
        );
        assert_eq!(
            NotifierProfile::second(&countdown).completion_message(&ChannelId::new("002")),
            "Process for Second Notification Channel ID 002 is done!"
        );
    }

    #[test]
    fn initial_display_is_ongoing_and_audible() {
        let spec = NotifierProfile::first(&CountdownConfig::default()).display();
        assert!(spec.ongoing);
        assert!(!spec.silent);
        assert_eq!(spec.body, "Check it out!");

        let update = spec.silent_update(countdown_body(3));
        assert!(update.silent);
        assert_eq!(update.body, "3 seconds until last warning");
        assert_eq!(update.title, spec.title);
    }
}
